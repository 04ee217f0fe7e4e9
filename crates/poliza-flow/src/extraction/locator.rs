use super::fields::{CanonicalPolicyFields, FieldKind, PolicyField};
use super::normalizer::{
    format_amount, normalize_amount, normalize_date, normalize_integer, parse_amount,
    strip_label,
};
use super::ExtractedFieldSet;
use std::collections::BTreeMap;
use tracing::debug;

/// Return the normalized value of the first candidate key that holds a
/// non-blank value, or `""` when none does.
pub fn locate<F>(fields: &ExtractedFieldSet, candidate_keys: &[&str], normalize: F) -> String
where
    F: Fn(&str) -> String,
{
    candidate_keys
        .iter()
        .find_map(|key| fields.get(key).filter(|value| !value.trim().is_empty()))
        .map(normalize)
        .unwrap_or_default()
}

/// Free-text document values that only exist to be matched against a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FreeTextField {
    Fuel,
    Destination,
    Category,
    Quality,
    Tariff,
}

impl FreeTextField {
    pub const fn labels(self) -> &'static [&'static str] {
        match self {
            Self::Fuel => &["COMBUSTIBLE"],
            Self::Destination => &["DESTINO", "USO"],
            Self::Category => &["CATEGORÍA", "CATEGORIA", "TIPO DE VEHÍCULO", "TIPO DE VEHICULO", "TIPO"],
            Self::Quality => &["CALIDAD"],
            Self::Tariff => &["TARIFA", "PLAN"],
        }
    }

    const fn keys(self) -> &'static [&'static str] {
        match self {
            Self::Fuel => &[
                "vehiculo.combustible",
                "vehiculoCombustible",
                "combustible",
                "VehiculoCombustible",
                "FuelType",
            ],
            Self::Destination => &[
                "vehiculo.destino",
                "vehiculo.uso",
                "vehiculoDestino",
                "vehiculoUso",
                "destino",
                "uso",
            ],
            Self::Category => &[
                "vehiculo.categoria",
                "vehiculo.tipo",
                "vehiculoCategoria",
                "vehiculoTipo",
                "categoria",
            ],
            Self::Quality => &["poliza.calidad", "vehiculo.calidad", "calidad", "polizaCalidad"],
            Self::Tariff => &["poliza.tarifa", "poliza.plan", "tarifa", "polizaTarifa", "plan"],
        }
    }
}

const fn base_keys(field: PolicyField) -> &'static [&'static str] {
    match field {
        PolicyField::PolicyNumber => &[
            "poliza.numero",
            "poliza.numeroPoliza",
            "polizaNumero",
            "numeroPoliza",
            "PolicyNumber",
            "policyNumber",
        ],
        PolicyField::ValidFrom => &[
            "poliza.vigencia.desde",
            "poliza.desde",
            "vigencia.desde",
            "polizaVigenciaDesde",
            "vigenciaDesde",
            "fechaDesde",
            "ValidFrom",
        ],
        PolicyField::ValidTo => &[
            "poliza.vigencia.hasta",
            "poliza.hasta",
            "vigencia.hasta",
            "polizaVigenciaHasta",
            "vigenciaHasta",
            "fechaHasta",
            "ValidTo",
        ],
        PolicyField::Premium => &[
            "costo.premio",
            "poliza.premio",
            "poliza.prima",
            "costoPremio",
            "premio",
            "prima",
            "primaComercial",
            "Premium",
        ],
        PolicyField::Total => &[
            "costo.premio_total",
            "costo.total",
            "costoPremioTotal",
            "premioTotal",
            "montoTotal",
            "total",
            "TotalAmount",
        ],
        PolicyField::InstallmentCount => &[
            "pago.cantidad_cuotas",
            "pago.cuotas.cantidad",
            "pagoCantidadCuotas",
            "cantidadCuotas",
            "cuotas",
            "InstallmentCount",
        ],
        PolicyField::InstallmentAmount => &[
            "pago.valor_cuota",
            "pago.cuotas[0].prima",
            "pago.cuotas[0].monto",
            "pagoValorCuota",
            "valorCuota",
            "primaCuota",
            "InstallmentAmount",
        ],
        PolicyField::VehicleMake => &["vehiculo.marca", "vehiculoMarca", "marca", "VehicleMake"],
        PolicyField::VehicleModel => &[
            "vehiculo.modelo",
            "vehiculoModelo",
            "modelo",
            "VehicleModel",
        ],
        PolicyField::VehicleYear => &[
            "vehiculo.anio",
            "vehiculo.año",
            "vehiculoAnio",
            "vehiculoAño",
            "anio",
            "VehicleYear",
        ],
        PolicyField::VehiclePlate => &[
            "vehiculo.matricula",
            "vehiculo.chapa",
            "vehiculoMatricula",
            "matricula",
            "VehiclePlate",
        ],
        PolicyField::VehicleChassis => &[
            "vehiculo.chasis",
            "vehiculoChasis",
            "chasis",
            "VehicleChassis",
        ],
        PolicyField::VehicleEngine => &["vehiculo.motor", "vehiculoMotor", "motor", "VehicleEngine"],
        PolicyField::VehicleRegistration => &[
            "vehiculo.padron",
            "vehiculoPadron",
            "padron",
            "VehicleRegistration",
        ],
        PolicyField::InsuredName => &[
            "asegurado.nombre",
            "tomador.nombre",
            "aseguradoNombre",
            "nombreAsegurado",
            "InsuredName",
        ],
        PolicyField::InsuredDocument => &[
            "asegurado.documento",
            "asegurado.ci",
            "asegurado.rut",
            "aseguradoDocumento",
            "documento",
            "InsuredDocument",
        ],
        PolicyField::InsuredAddress => &[
            "asegurado.direccion",
            "asegurado.domicilio",
            "aseguradoDireccion",
            "aseguradoDomicilio",
            "direccion",
            "InsuredAddress",
        ],
        PolicyField::InsuredDepartment => &[
            "asegurado.departamento",
            "aseguradoDepartamento",
            "departamento",
            "InsuredDepartment",
        ],
    }
}

/// Ordered candidate keys per logical field. Flow-specific keys are tried
/// before the shared ones.
#[derive(Debug, Clone, Default)]
pub struct CandidateKeyTable {
    extra: BTreeMap<PolicyField, Vec<&'static str>>,
}

impl CandidateKeyTable {
    pub fn standard() -> Self {
        Self::default()
    }

    pub fn with_keys(mut self, field: PolicyField, keys: &[&'static str]) -> Self {
        self.extra.entry(field).or_default().extend_from_slice(keys);
        self
    }

    pub fn keys(&self, field: PolicyField) -> Vec<&'static str> {
        let mut keys = self.extra.get(&field).cloned().unwrap_or_default();
        keys.extend_from_slice(base_keys(field));
        keys
    }

    /// Cleaned value for a single canonical field, without derived fallbacks.
    pub fn locate_field(&self, fields: &ExtractedFieldSet, field: PolicyField) -> String {
        let keys = self.keys(field);
        match field.kind() {
            FieldKind::Text => locate(fields, &keys, |raw| strip_label(raw, field.labels())),
            FieldKind::Amount => locate(fields, &keys, normalize_amount),
            FieldKind::Integer => locate(fields, &keys, normalize_integer),
            FieldKind::Date => locate(fields, &keys, normalize_date),
        }
    }

    /// Label-stripped free text used by the mapping engine.
    pub fn locate_free_text(&self, fields: &ExtractedFieldSet, field: FreeTextField) -> String {
        locate(fields, field.keys(), |raw| strip_label(raw, field.labels()))
    }

    /// Build the canonical record, deriving installment amount and total
    /// from each other when only one of them is printed on the document.
    pub fn canonical_fields(&self, fields: &ExtractedFieldSet) -> CanonicalPolicyFields {
        let mut canonical = CanonicalPolicyFields::default();
        for field in PolicyField::ordered() {
            canonical.set(field, self.locate_field(fields, field));
        }

        let count = canonical
            .cantidad_cuotas
            .parse::<u32>()
            .ok()
            .filter(|count| *count > 1);

        if let Some(count) = count {
            let direct_installment = parse_amount(&canonical.valor_cuota);
            let direct_total = parse_amount(&canonical.monto_total);

            if direct_installment.is_none() {
                let total = direct_total.or_else(|| parse_amount(&canonical.premio));
                if let Some(total) = total {
                    canonical.valor_cuota = format_amount(total / f64::from(count));
                    debug!(count, total, derived = %canonical.valor_cuota, "derived installment amount");
                }
            }

            if direct_total.is_none() {
                if let Some(installment) = direct_installment {
                    canonical.monto_total = format_amount(installment * f64::from(count));
                    debug!(count, installment, derived = %canonical.monto_total, "derived total amount");
                }
            }
        }

        canonical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(pairs: &[(&str, &str)]) -> ExtractedFieldSet {
        pairs.iter().copied().collect()
    }

    #[test]
    fn locate_returns_first_present_non_blank_key() {
        let fields = bag(&[("vehiculoMarca", "  "), ("marca", "FIAT"), ("VehicleMake", "VW")]);
        let found = locate(&fields, &["vehiculo.marca", "vehiculoMarca", "marca", "VehicleMake"], |v| {
            v.to_string()
        });
        assert_eq!(found, "FIAT");
    }

    #[test]
    fn locate_is_empty_when_nothing_matches() {
        let fields = bag(&[("otro", "x")]);
        assert_eq!(locate(&fields, &["vehiculo.marca"], |v| v.to_string()), "");
    }

    #[test]
    fn flow_specific_keys_are_tried_first() {
        let table = CandidateKeyTable::standard()
            .with_keys(PolicyField::PolicyNumber, &["renovacion.numeroPoliza"]);
        let keys = table.keys(PolicyField::PolicyNumber);
        assert_eq!(keys[0], "renovacion.numeroPoliza");
        assert_eq!(keys[1], "poliza.numero");

        let fields = bag(&[("poliza.numero", "111"), ("renovacion.numeroPoliza", "222")]);
        assert_eq!(table.locate_field(&fields, PolicyField::PolicyNumber), "222");
        assert_eq!(
            CandidateKeyTable::standard().locate_field(&fields, PolicyField::PolicyNumber),
            "111"
        );
    }

    #[test]
    fn canonical_fields_apply_per_kind_normalizers() {
        let fields = bag(&[
            ("poliza.vigencia.desde", "17/09/2025"),
            ("vigenciaHasta", "17.09.2026"),
            ("costo.premio", "$ 1.234,56"),
            ("vehiculo.marca", "MARCA\nVOLKSWAGEN"),
            ("vehiculoAnio", "AÑO 2019"),
            ("vehiculo.padron", "PADRÓN: 903112"),
        ]);
        let canonical = CandidateKeyTable::standard().canonical_fields(&fields);
        assert_eq!(canonical.vigencia_desde, "2025-09-17");
        assert_eq!(canonical.vigencia_hasta, "2026-09-17");
        assert_eq!(canonical.premio, "1234.56");
        assert_eq!(canonical.vehiculo_marca, "VOLKSWAGEN");
        assert_eq!(canonical.vehiculo_anio, "2019");
        assert_eq!(canonical.vehiculo_padron, "903112");
    }

    #[test]
    fn installment_amount_is_derived_from_total_and_count() {
        let fields = bag(&[("pago.cantidad_cuotas", "3"), ("costo.premio_total", "300,00")]);
        let canonical = CandidateKeyTable::standard().canonical_fields(&fields);
        assert_eq!(canonical.valor_cuota, "100.00");
        assert_eq!(canonical.monto_total, "300.00");
    }

    #[test]
    fn total_is_derived_from_installment_and_count() {
        let fields = bag(&[("cantidadCuotas", "4"), ("valorCuota", "250,50")]);
        let canonical = CandidateKeyTable::standard().canonical_fields(&fields);
        assert_eq!(canonical.monto_total, "1002.00");
        assert_eq!(canonical.valor_cuota, "250.50");
    }

    #[test]
    fn single_installment_derives_nothing() {
        let fields = bag(&[("cantidadCuotas", "1"), ("montoTotal", "900")]);
        let canonical = CandidateKeyTable::standard().canonical_fields(&fields);
        assert_eq!(canonical.valor_cuota, "");
    }

    #[test]
    fn direct_installment_value_wins_over_derivation() {
        let fields = bag(&[
            ("cantidadCuotas", "3"),
            ("montoTotal", "300"),
            ("pago.cuotas[0].prima", "110,00"),
        ]);
        let canonical = CandidateKeyTable::standard().canonical_fields(&fields);
        assert_eq!(canonical.valor_cuota, "110.00");
    }

    #[test]
    fn free_text_strips_labels() {
        let fields = bag(&[("vehiculo.combustible", "COMBUSTIBLE\nNAFTA")]);
        let table = CandidateKeyTable::standard();
        assert_eq!(table.locate_free_text(&fields, FreeTextField::Fuel), "NAFTA");
        assert_eq!(table.locate_free_text(&fields, FreeTextField::Tariff), "");
    }
}
