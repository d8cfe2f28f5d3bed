use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::{GeoPoint, VehicleClass};

/// 行程记录，派单状态机的唯一共享可变状态。
///
/// `available_captains` 与 `current_captain_index` 只能由派单器通过
/// 仓储的条件写入修改；状态一旦离开 `Pending`，候选列表与游标即被冻结。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: i64,
    pub rider_id: i64,
    /// 接单司机，接单成功前为空
    pub captain_id: Option<i64>,
    pub pickup: String,
    pub destination: String,
    /// 地理编码完成后回填的上车点坐标
    pub pickup_point: Option<GeoPoint>,
    pub vehicle: VehicleClass,
    pub status: RideStatus,
    /// 按距离升序排列的候选司机列表
    pub available_captains: Vec<i64>,
    /// 指向当前被报价候选的游标
    pub current_captain_index: i64,
    /// 行程验证码，不允许外发
    #[serde(skip_serializing, default)]
    pub otp: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RideStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "accepted")]
    Accepted,
    #[serde(rename = "ongoing")]
    Ongoing,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Pending => "pending",
            RideStatus::Accepted => "accepted",
            RideStatus::Ongoing => "ongoing",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Sqlite> for RideStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for RideStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "pending" => Ok(RideStatus::Pending),
            "accepted" => Ok(RideStatus::Accepted),
            "ongoing" => Ok(RideStatus::Ongoing),
            "completed" => Ok(RideStatus::Completed),
            "cancelled" => Ok(RideStatus::Cancelled),
            _ => Err(format!("Invalid ride status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for RideStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// 创建行程时的输入，id与状态由仓储生成
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRide {
    pub rider_id: i64,
    pub pickup: String,
    pub destination: String,
    pub vehicle: VehicleClass,
    pub otp: String,
}

impl NewRide {
    pub fn new(
        rider_id: i64,
        pickup: impl Into<String>,
        destination: impl Into<String>,
        vehicle: VehicleClass,
    ) -> Self {
        Self {
            rider_id,
            pickup: pickup.into(),
            destination: destination.into(),
            vehicle,
            otp: generate_otp(),
        }
    }
}

/// 六位数字行程验证码
pub fn generate_otp() -> String {
    let mut rng = rand::rng();
    format!("{:06}", rng.random_range(0..1_000_000))
}

impl Ride {
    pub fn is_pending(&self) -> bool {
        self.status == RideStatus::Pending
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, RideStatus::Completed | RideStatus::Cancelled)
    }

    pub fn candidate_count(&self) -> i64 {
        self.available_captains.len() as i64
    }

    /// 当前游标指向的候选司机
    pub fn current_candidate(&self) -> Option<i64> {
        usize::try_from(self.current_captain_index)
            .ok()
            .and_then(|i| self.available_captains.get(i))
            .copied()
    }
}
