use std::sync::Arc;

use poliza_flow::backoffice::{
    BackOfficeGateway, GatewayError, HttpBackOffice, StaticToken, SubmissionRequest,
    TokenProvider,
};
use poliza_flow::config::FlowConfig;
use poliza_flow::extraction::CanonicalPolicyFields;
use poliza_flow::flows::{DocumentUpload, FlowContext, FlowKind, FlowPhase, FlowSession};
use poliza_flow::mapping::{MasterDataSelection, SelectionSlot};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use url::Url;

/// Answer one connection per canned response, in order, and hand back
/// every request the client sent, body included.
async fn serve(responses: Vec<(&'static str, String)>) -> (Url, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let address = listener.local_addr().expect("listener address");

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for (status_line, body) in responses {
            let (mut socket, _) = listener.accept().await.expect("accept connection");
            requests.push(read_request(&mut socket).await);

            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            socket.shutdown().await.ok();
        }
        requests
    });

    let base_url = Url::parse(&format!("http://{address}/")).expect("loopback url");
    (base_url, handle)
}

async fn serve_once(status_line: &'static str, body: &'static str) -> (Url, JoinHandle<String>) {
    let (base_url, server) = serve(vec![(status_line, body.to_string())]).await;
    let handle = tokio::spawn(async move { server.await.expect("server task").remove(0) });
    (base_url, handle)
}

/// Read the head, then as much body as `content-length` announces (or up to
/// the last chunk of a chunked body).
async fn read_request(socket: &mut TcpStream) -> String {
    let mut received = Vec::new();
    let mut buffer = [0_u8; 4096];
    loop {
        if let Some(head_end) = find(&received, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&received[..head_end]).to_lowercase();
            let body = &received[head_end + 4..];
            let complete = match content_length(&head) {
                Some(length) => body.len() >= length,
                None if head.contains("transfer-encoding: chunked") => {
                    body.ends_with(b"0\r\n\r\n")
                }
                None => true,
            };
            if complete {
                break;
            }
        }
        let read = socket.read(&mut buffer).await.expect("read request");
        if read == 0 {
            break;
        }
        received.extend_from_slice(&buffer[..read]);
    }
    String::from_utf8_lossy(&received).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn content_length(head: &str) -> Option<usize> {
    head.lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse().ok())
}

fn body_of(request: &str) -> &str {
    request
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .unwrap_or_default()
}

fn renewal_context() -> FlowContext {
    FlowContext {
        client_id: Some("10".to_string()),
        prior_policy_id: Some("900".to_string()),
        ..FlowContext::default()
    }
}

fn pdf() -> DocumentUpload {
    DocumentUpload::new("poliza.pdf", mime::APPLICATION_PDF, b"%PDF-1.4 test".to_vec())
}

#[tokio::test]
async fn unauthorized_response_discards_the_token() {
    let (base_url, server) = serve_once("HTTP/1.1 401 Unauthorized", "").await;
    let tokens = Arc::new(StaticToken::new("abc123"));
    let gateway = HttpBackOffice::new(base_url, tokens.clone());

    let result = gateway.companies().await;

    assert!(matches!(result, Err(GatewayError::Unauthorized)));
    assert_eq!(tokens.bearer_token(), None);

    let request = server.await.expect("server task").to_lowercase();
    assert!(request.starts_with("get /api/companias "));
    assert!(request.contains("authorization: bearer abc123"));
}

#[tokio::test]
async fn error_status_carries_the_server_message() {
    let (base_url, server) = serve_once(
        "HTTP/1.1 422 Unprocessable Entity",
        r#"{"mensaje":"El cliente no tiene pólizas vigentes"}"#,
    )
    .await;
    let gateway = HttpBackOffice::new(base_url, Arc::new(StaticToken::new("abc123")));

    let err = gateway
        .client_policies("10")
        .await
        .expect_err("422 is an error");

    match &err {
        GatewayError::Http { status, message } => {
            assert_eq!(*status, 422);
            assert_eq!(message, "El cliente no tiene pólizas vigentes");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.user_message(), "El cliente no tiene pólizas vigentes");
    server.await.expect("server task");
}

#[tokio::test]
async fn client_policies_decode_back_office_payload() {
    let (base_url, server) = serve_once(
        "HTTP/1.1 200 OK",
        r#"[{"id":900,"numeroPoliza":"4471203","companiaId":2,"seccionId":4,"vigenciaHasta":"2026-09-17"}]"#,
    )
    .await;
    let gateway = HttpBackOffice::new(base_url, Arc::new(StaticToken::anonymous()));

    let policies = gateway.client_policies(" 10 ").await.expect("policies decode");

    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0].id, "900");
    assert_eq!(policies[0].number, "4471203");
    assert_eq!(policies[0].company_id.as_deref(), Some("2"));
    assert_eq!(policies[0].section_id.as_deref(), Some("4"));

    let request = server.await.expect("server task").to_lowercase();
    assert!(request.starts_with("get /api/clientes/10/polizas "));
    assert!(!request.contains("authorization:"));
}

#[tokio::test]
async fn master_data_is_requested_per_company() {
    let (base_url, server) = serve_once(
        "HTTP/1.1 200 OK",
        r#"{"combustibles":[{"id":3,"nombre":"Nafta"}],"tarifas":[{"id":51,"nombre":"Tarifa Full","companiaId":7}]}"#,
    )
    .await;
    let gateway = HttpBackOffice::new(base_url, Arc::new(StaticToken::new("abc123")));

    let catalogs = gateway.master_data("7").await.expect("catalogs decode");

    assert_eq!(catalogs.find(SelectionSlot::Fuel, "3").map(|e| e.name.as_str()), Some("Nafta"));
    assert_eq!(catalogs.tariffs_for_company(Some("7")).len(), 1);

    let request = server.await.expect("server task");
    assert!(request.starts_with("GET /api/maestros?companiaId=7 "));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let (base_url, server) = serve_once("HTTP/1.1 200 OK", "<html>mantenimiento</html>").await;
    let gateway = HttpBackOffice::new(base_url, Arc::new(StaticToken::new("abc123")));

    let result = gateway.sections().await;

    assert!(matches!(result, Err(GatewayError::Decode(_))));
    server.await.expect("server task");
}

#[tokio::test]
async fn client_search_sends_the_term_as_query() {
    let (base_url, server) = serve_once(
        "HTTP/1.1 200 OK",
        r#"[{"id":10,"nombre":"María Pérez","documento":"1.234.567-8"}]"#,
    )
    .await;
    let gateway = HttpBackOffice::new(base_url, Arc::new(StaticToken::new("abc123")));

    let clients = gateway.search_clients(" perez 1234 ").await.expect("clients decode");

    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].id, "10");
    assert_eq!(clients[0].document.as_deref(), Some("1.234.567-8"));
    let request = server.await.expect("server task");
    assert!(request.starts_with("GET /api/clientes?busqueda=perez+1234 "));
}

#[tokio::test]
async fn upload_sends_the_document_as_multipart() {
    let (base_url, server) = serve_once(
        "HTTP/1.1 200 OK",
        r#"{"documentoId":77,"datosExtraidos":{"poliza":{"numero":"AU-60001"}},"confianza":0.9}"#,
    )
    .await;
    let gateway = HttpBackOffice::new(base_url, Arc::new(StaticToken::new("abc123")));

    let receipt = gateway
        .upload_document(FlowKind::Renewal, &renewal_context(), &pdf())
        .await
        .expect("upload accepted");

    assert_eq!(receipt.document_id, "77");
    let scan = receipt.scan.expect("inline scan");
    assert_eq!(scan.extracted.get("poliza.numero"), Some("AU-60001"));
    assert!((scan.confidence - 90.0).abs() < 1e-9);

    let request = server.await.expect("server task").to_lowercase();
    assert!(request.starts_with("post /api/documentos/upload "));
    assert!(request.contains("content-type: multipart/form-data; boundary="));
    assert!(request.contains("authorization: bearer abc123"));
    assert!(request.contains("name=\"file\"; filename=\"poliza.pdf\""));
    assert!(request.contains("content-type: application/pdf"));
    assert!(request.contains("%pdf-1.4 test"));
    assert!(request.contains("name=\"flujo\"\r\n\r\nrenovacion"));
    assert!(request.contains("name=\"clienteid\"\r\n\r\n10"));
    assert!(request.contains("name=\"polizaanteriorid\"\r\n\r\n900"));
    assert!(!request.contains("name=\"companiaid\""));
}

#[tokio::test]
async fn upload_without_document_id_is_a_decode_error() {
    let (base_url, server) = serve_once("HTTP/1.1 200 OK", r#"{"confianza":90}"#).await;
    let gateway = HttpBackOffice::new(base_url, Arc::new(StaticToken::anonymous()));

    let result = gateway
        .upload_document(FlowKind::Change, &renewal_context(), &pdf())
        .await;

    assert!(matches!(result, Err(GatewayError::Decode(_))));
    server.await.expect("server task");
}

#[tokio::test]
async fn change_flow_runs_against_the_http_back_office() {
    let (base_url, server) = serve(vec![
        ("HTTP/1.1 200 OK", r#"{"documentoId":"abc"}"#.to_string()),
        (
            "HTTP/1.1 200 OK",
            r#"{"datosExtraidos":{"poliza":{"numero":"AU-55120"},"pago":{"cantidad_cuotas":"4"},"vehiculo":{"marca":"FIAT","modelo":"UNO"}},"confianza":88}"#
                .to_string(),
        ),
        (
            "HTTP/1.1 200 OK",
            r#"{"success":true,"mensaje":"Cambio registrado","numeroPoliza":"AU-55120","polizaId":900,"warnings":["Endoso pendiente de firma"]}"#
                .to_string(),
        ),
    ])
    .await;
    let gateway = Arc::new(HttpBackOffice::new(base_url, Arc::new(StaticToken::new("abc123"))));
    let mut session = FlowSession::new(FlowKind::Change, gateway, FlowConfig::default());
    session
        .select_context(renewal_context())
        .expect("context accepted");

    session.upload(pdf()).await.expect("upload and scan");
    assert_eq!(session.state().fields.numero_poliza, "AU-55120");
    assert_eq!(session.state().selection.installment_count, Some(4));
    assert_eq!(session.phase(), FlowPhase::Reviewing);

    session.select(SelectionSlot::Fuel, Some("3".to_string()));
    session.select(SelectionSlot::Category, Some("20".to_string()));
    let result = session.submit().await.expect("change accepted");
    assert_eq!(result.message, "Cambio registrado");
    assert_eq!(result.policy_id.as_deref(), Some("900"));
    assert_eq!(result.warnings, vec!["Endoso pendiente de firma".to_string()]);

    let requests = server.await.expect("server task");
    assert!(requests[0].starts_with("POST /api/documentos/upload "));
    assert!(requests[1].starts_with("POST /api/documentos/abc/escanear "));
    assert!(requests[2].starts_with("POST /api/cambios/modificar-en-velneo "));

    let body = body_of(&requests[2]);
    assert_eq!(body.matches("\"cantidadCuotas\"").count(), 1);
    let submitted: Value = serde_json::from_str(body).expect("json body");
    assert_eq!(submitted["clienteId"], "10");
    assert_eq!(submitted["polizaAnteriorId"], "900");
    assert_eq!(submitted["documentoId"], "abc");
    assert_eq!(submitted["numeroPoliza"], "AU-55120");
    assert_eq!(submitted["combustibleId"], "3");
    assert_eq!(submitted["cantidadCuotas"], 4);
}

#[tokio::test]
async fn each_flow_finalizes_at_its_own_endpoint() {
    let expected = [
        "POST /api/polizas/crear-en-velneo ",
        "POST /api/renovaciones/renovar-en-velneo ",
        "POST /api/cambios/modificar-en-velneo ",
    ];
    for (kind, path) in FlowKind::ordered().into_iter().zip(expected) {
        let (base_url, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"success":true,"message":"ok","numeroPoliza":4411,"advertencias":[]}"#,
        )
        .await;
        let gateway = HttpBackOffice::new(base_url, Arc::new(StaticToken::new("abc123")));
        let request = SubmissionRequest {
            cliente_id: "10".to_string(),
            compania_id: Some("2".to_string()),
            seccion_id: None,
            poliza_anterior_id: None,
            documento_id: None,
            campos: CanonicalPolicyFields::default(),
            seleccion: MasterDataSelection::default(),
        };

        let response = gateway.finalize(kind, &request).await.expect("finalized");

        assert!(response.success);
        assert_eq!(response.numero_poliza.as_deref(), Some("4411"));
        let sent = server.await.expect("server task");
        assert!(sent.starts_with(path), "{kind:?} sent {sent}");
        assert!(sent.to_lowercase().contains("content-type: application/json"));
    }
}

#[tokio::test]
async fn billing_decodes_spanish_installment_rows() {
    let (base_url, server) = serve_once(
        "HTTP/1.1 200 OK",
        r#"[{"numeroCuota":1,"fechaVencimiento":"2025-10-10","importe":1500.5,"estado":"Pendiente"},{"numero":2,"vencimiento":"10/11/2025","monto":1500.5,"estado":"Pagada"}]"#,
    )
    .await;
    let gateway = HttpBackOffice::new(base_url, Arc::new(StaticToken::new("abc123")));

    let installments = gateway.billing("900").await.expect("installments decode");

    assert_eq!(installments.len(), 2);
    assert_eq!(installments[0].number, 1);
    assert_eq!(installments[0].due_date, "2025-10-10");
    assert!((installments[1].amount - 1500.5).abs() < 1e-9);
    assert_eq!(installments[1].status, "Pagada");
    let request = server.await.expect("server task");
    assert!(request.starts_with("GET /api/polizas/900/cuotas "));
}
