use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::vehicle::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Retailer,
    Wholesaler,
    VehicleOwner,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Retailer,
        Role::Wholesaler,
        Role::VehicleOwner,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Retailer => "retailer",
            Role::Wholesaler => "wholesaler",
            Role::VehicleOwner => "vehicle_owner",
            Role::Admin => "admin",
        }
    }

    /// Landing page of each role.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Retailer => "/retailer-dashboard",
            Role::Wholesaler => "/wholesaler-dashboard",
            Role::VehicleOwner => "/vehicle-dashboard",
            Role::Admin => "/admin-dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    /// Accepts the spellings found in older profiles: any case, with `-`,
    /// `_`, spaces or camelCase between words, plus the driver aliases.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let squashed: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match squashed.as_str() {
            "retailer" | "retail" | "shopkeeper" => Ok(Role::Retailer),
            "wholesaler" | "wholesale" | "supplier" => Ok(Role::Wholesaler),
            "vehicleowner" | "vehicle" | "driver" | "transporter" => Ok(Role::VehicleOwner),
            "admin" | "administrator" => Ok(Role::Admin),
            _ => Err(format!("unknown role: {raw}")),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    #[default]
    NotSubmitted,
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub line: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub pincode: String,
}

impl Address {
    /// Single-line form used in delivery snapshots.
    pub fn flatten(&self) -> String {
        [&self.line, &self.city, &self.state, &self.pincode]
            .iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(alias = "userType")]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default)]
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_number: Option<String>,
    #[serde(default)]
    pub kyc_status: KycStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyc_rejection_reason: Option<String>,
    #[serde(default)]
    pub online: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.business_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::{Address, Role};

    #[test]
    fn role_parsing_accepts_legacy_spellings() {
        assert_eq!("vehicleOwner".parse::<Role>(), Ok(Role::VehicleOwner));
        assert_eq!("vehicle-owner".parse::<Role>(), Ok(Role::VehicleOwner));
        assert_eq!("Vehicle Owner".parse::<Role>(), Ok(Role::VehicleOwner));
        assert_eq!("driver".parse::<Role>(), Ok(Role::VehicleOwner));
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert!("courier-king".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_snake_case() {
        let json = serde_json::to_string(&Role::VehicleOwner).unwrap();
        assert_eq!(json, "\"vehicle_owner\"");
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Role::VehicleOwner);
    }

    #[test]
    fn address_flatten_skips_blank_parts() {
        let address = Address {
            line: "12 MG Road".to_string(),
            city: "Pune".to_string(),
            state: " ".to_string(),
            pincode: "411001".to_string(),
        };
        assert_eq!(address.flatten(), "12 MG Road, Pune, 411001");
    }
}
