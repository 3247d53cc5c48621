use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::query::{ColumnKind, Value};
use crate::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "role_type", rename_all = "UPPERCASE")]
pub enum RoleType {
    #[default]
    User,
    Admin,
}

impl RoleType {
    pub const TYPE_NAME: &'static str = "role_type";
    pub const LABELS: &'static [&'static str] = &["USER", "ADMIN"];
    pub const COLUMN_KIND: ColumnKind = ColumnKind::Enum {
        type_name: Self::TYPE_NAME,
        variants: Self::LABELS,
    };

    pub const fn code(&self) -> &'static str {
        match self {
            RoleType::User => "USER",
            RoleType::Admin => "ADMIN",
        }
    }
}

impl FromStr for RoleType {
    type Err = AppError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "USER" => Ok(RoleType::User),
            "ADMIN" => Ok(RoleType::Admin),
            other => Err(AppError::ValidationError(format!(
                "Unknown role '{}', expected one of {}",
                other,
                RoleType::LABELS.join(", ")
            ))),
        }
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl From<RoleType> for Value {
    fn from(role: RoleType) -> Self {
        Value::Enum {
            type_name: RoleType::TYPE_NAME,
            label: role.code().to_string(),
        }
    }
}
