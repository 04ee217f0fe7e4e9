use poliza_flow_cli::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("application error: {err}");
        if err.is_unauthorized() {
            eprintln!("run `poliza-flow login --token <TOKEN>` to sign in again");
        }
        std::process::exit(1);
    }
}
