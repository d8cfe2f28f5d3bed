use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::GeoPoint;

/// 司机（captain）记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: i64,
    pub name: String,
    pub vehicle: VehicleClass,
    pub location: GeoPoint,
    /// 当前推送连接标识，断线时为空。
    /// 报价只能送达持有活跃连接的司机。
    pub connection_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Driver {
    pub fn is_reachable(&self) -> bool {
        self.connection_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Bike,
    Auto,
    Tuktuk,
    Torsicle,
    Delivery,
}

impl VehicleClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Bike => "bike",
            VehicleClass::Auto => "auto",
            VehicleClass::Tuktuk => "tuktuk",
            VehicleClass::Torsicle => "torsicle",
            VehicleClass::Delivery => "delivery",
        }
    }
}

impl std::fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Sqlite> for VehicleClass {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for VehicleClass {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "car" => Ok(VehicleClass::Car),
            "bike" => Ok(VehicleClass::Bike),
            "auto" => Ok(VehicleClass::Auto),
            "tuktuk" => Ok(VehicleClass::Tuktuk),
            "torsicle" => Ok(VehicleClass::Torsicle),
            "delivery" => Ok(VehicleClass::Delivery),
            _ => Err(format!("Invalid vehicle class: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for VehicleClass {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// 注册司机时的输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDriver {
    pub name: String,
    pub vehicle: VehicleClass,
    pub location: GeoPoint,
}

impl NewDriver {
    pub fn new(name: impl Into<String>, vehicle: VehicleClass, location: GeoPoint) -> Self {
        Self {
            name: name.into(),
            vehicle,
            location,
        }
    }
}
