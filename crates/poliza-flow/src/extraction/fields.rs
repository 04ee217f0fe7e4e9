use serde::{Deserialize, Serialize};

/// Logical fields the wizard reads out of a policy document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyField {
    PolicyNumber,
    ValidFrom,
    ValidTo,
    Premium,
    Total,
    InstallmentCount,
    InstallmentAmount,
    VehicleMake,
    VehicleModel,
    VehicleYear,
    VehiclePlate,
    VehicleChassis,
    VehicleEngine,
    VehicleRegistration,
    InsuredName,
    InsuredDocument,
    InsuredAddress,
    InsuredDepartment,
}

/// How a located raw value is cleaned before it lands in the canonical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Amount,
    Integer,
    Date,
}

impl PolicyField {
    pub const fn ordered() -> [Self; 18] {
        [
            Self::PolicyNumber,
            Self::ValidFrom,
            Self::ValidTo,
            Self::Premium,
            Self::Total,
            Self::InstallmentCount,
            Self::InstallmentAmount,
            Self::VehicleMake,
            Self::VehicleModel,
            Self::VehicleYear,
            Self::VehiclePlate,
            Self::VehicleChassis,
            Self::VehicleEngine,
            Self::VehicleRegistration,
            Self::InsuredName,
            Self::InsuredDocument,
            Self::InsuredAddress,
            Self::InsuredDepartment,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PolicyNumber => "Número de póliza",
            Self::ValidFrom => "Vigencia desde",
            Self::ValidTo => "Vigencia hasta",
            Self::Premium => "Premio",
            Self::Total => "Monto total",
            Self::InstallmentCount => "Cantidad de cuotas",
            Self::InstallmentAmount => "Valor de cuota",
            Self::VehicleMake => "Marca",
            Self::VehicleModel => "Modelo",
            Self::VehicleYear => "Año",
            Self::VehiclePlate => "Matrícula",
            Self::VehicleChassis => "Chasis",
            Self::VehicleEngine => "Motor",
            Self::VehicleRegistration => "Padrón",
            Self::InsuredName => "Asegurado",
            Self::InsuredDocument => "Documento",
            Self::InsuredAddress => "Domicilio",
            Self::InsuredDepartment => "Departamento",
        }
    }

    pub const fn kind(self) -> FieldKind {
        match self {
            Self::ValidFrom | Self::ValidTo => FieldKind::Date,
            Self::Premium | Self::Total | Self::InstallmentAmount => FieldKind::Amount,
            Self::InstallmentCount | Self::VehicleYear => FieldKind::Integer,
            _ => FieldKind::Text,
        }
    }

    /// Label prefixes OCR tends to leave glued to the value, longest first.
    pub const fn labels(self) -> &'static [&'static str] {
        match self {
            Self::PolicyNumber => &["PÓLIZA NRO", "POLIZA NRO", "PÓLIZA N°", "POLIZA N°", "PÓLIZA", "POLIZA"],
            Self::VehicleMake => &["MARCA"],
            Self::VehicleModel => &["MODELO"],
            Self::VehiclePlate => &["MATRÍCULA", "MATRICULA", "CHAPA"],
            Self::VehicleChassis => &["NRO. CHASIS", "N° CHASIS", "CHASIS"],
            Self::VehicleEngine => &["NRO. MOTOR", "N° MOTOR", "MOTOR"],
            Self::VehicleRegistration => &["PADRÓN", "PADRON"],
            Self::InsuredName => &["ASEGURADO", "TOMADOR", "NOMBRE"],
            Self::InsuredDocument => &["DOCUMENTO", "C.I.", "CI", "RUT"],
            Self::InsuredAddress => &["DOMICILIO", "DIRECCIÓN", "DIRECCION"],
            Self::InsuredDepartment => &["DEPARTAMENTO", "DEPTO"],
            _ => &[],
        }
    }

    /// Fields whose absence is flagged for manual attention after a scan.
    pub const fn is_required(self) -> bool {
        matches!(
            self,
            Self::PolicyNumber
                | Self::ValidFrom
                | Self::ValidTo
                | Self::Premium
                | Self::VehicleMake
                | Self::VehicleModel
                | Self::InsuredName
        )
    }
}

/// Strongly typed view of a scanned policy document. Empty strings mean
/// "not extracted"; the user fills them during review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanonicalPolicyFields {
    pub numero_poliza: String,
    pub vigencia_desde: String,
    pub vigencia_hasta: String,
    pub premio: String,
    pub monto_total: String,
    pub cantidad_cuotas: String,
    pub valor_cuota: String,
    pub vehiculo_marca: String,
    pub vehiculo_modelo: String,
    pub vehiculo_anio: String,
    pub vehiculo_matricula: String,
    pub vehiculo_chasis: String,
    pub vehiculo_motor: String,
    pub vehiculo_padron: String,
    pub asegurado_nombre: String,
    pub asegurado_documento: String,
    pub asegurado_domicilio: String,
    pub asegurado_departamento: String,
}

impl CanonicalPolicyFields {
    pub fn get(&self, field: PolicyField) -> &str {
        match field {
            PolicyField::PolicyNumber => &self.numero_poliza,
            PolicyField::ValidFrom => &self.vigencia_desde,
            PolicyField::ValidTo => &self.vigencia_hasta,
            PolicyField::Premium => &self.premio,
            PolicyField::Total => &self.monto_total,
            PolicyField::InstallmentCount => &self.cantidad_cuotas,
            PolicyField::InstallmentAmount => &self.valor_cuota,
            PolicyField::VehicleMake => &self.vehiculo_marca,
            PolicyField::VehicleModel => &self.vehiculo_modelo,
            PolicyField::VehicleYear => &self.vehiculo_anio,
            PolicyField::VehiclePlate => &self.vehiculo_matricula,
            PolicyField::VehicleChassis => &self.vehiculo_chasis,
            PolicyField::VehicleEngine => &self.vehiculo_motor,
            PolicyField::VehicleRegistration => &self.vehiculo_padron,
            PolicyField::InsuredName => &self.asegurado_nombre,
            PolicyField::InsuredDocument => &self.asegurado_documento,
            PolicyField::InsuredAddress => &self.asegurado_domicilio,
            PolicyField::InsuredDepartment => &self.asegurado_departamento,
        }
    }

    pub fn set(&mut self, field: PolicyField, value: impl Into<String>) {
        let slot = match field {
            PolicyField::PolicyNumber => &mut self.numero_poliza,
            PolicyField::ValidFrom => &mut self.vigencia_desde,
            PolicyField::ValidTo => &mut self.vigencia_hasta,
            PolicyField::Premium => &mut self.premio,
            PolicyField::Total => &mut self.monto_total,
            PolicyField::InstallmentCount => &mut self.cantidad_cuotas,
            PolicyField::InstallmentAmount => &mut self.valor_cuota,
            PolicyField::VehicleMake => &mut self.vehiculo_marca,
            PolicyField::VehicleModel => &mut self.vehiculo_modelo,
            PolicyField::VehicleYear => &mut self.vehiculo_anio,
            PolicyField::VehiclePlate => &mut self.vehiculo_matricula,
            PolicyField::VehicleChassis => &mut self.vehiculo_chasis,
            PolicyField::VehicleEngine => &mut self.vehiculo_motor,
            PolicyField::VehicleRegistration => &mut self.vehiculo_padron,
            PolicyField::InsuredName => &mut self.asegurado_nombre,
            PolicyField::InsuredDocument => &mut self.asegurado_documento,
            PolicyField::InsuredAddress => &mut self.asegurado_domicilio,
            PolicyField::InsuredDepartment => &mut self.asegurado_departamento,
        };
        *slot = value.into();
    }

    pub fn is_empty(&self) -> bool {
        PolicyField::ordered()
            .iter()
            .all(|field| self.get(*field).trim().is_empty())
    }

    /// Required fields that are still blank.
    pub fn missing_required(&self) -> Vec<PolicyField> {
        PolicyField::ordered()
            .into_iter()
            .filter(|field| field.is_required() && self.get(*field).trim().is_empty())
            .collect()
    }

    /// How many fields were extracted (out of all of them).
    pub fn coverage(&self) -> (usize, usize) {
        let all = PolicyField::ordered();
        let filled = all
            .iter()
            .filter(|field| !self.get(**field).trim().is_empty())
            .count();
        (filled, all.len())
    }
}
