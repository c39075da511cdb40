use serde::{Deserialize, Serialize};

/// Medicare service-pricing record / 医疗服务价格记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "Place_of_Service")]
    pub place_of_service: String,
    #[serde(rename = "Type_of_Service")]
    pub type_of_service: String,
    #[serde(rename = "Allowed_Charges_Per_Person")]
    pub allowed_charges_per_person: f64,
}

/// Account sign-in status / 账户登录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    #[serde(rename = "loggedin")]
    SignedIn,
    #[serde(rename = "loggedout")]
    SignedOut,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::SignedIn => "loggedin",
            AccountStatus::SignedOut => "loggedout",
        }
    }

    /// Unknown values read as signed out / 未知值视为未登录
    pub fn parse(value: &str) -> Self {
        match value {
            "loggedin" => AccountStatus::SignedIn,
            _ => AccountStatus::SignedOut,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub status: String,
    pub last_login_at: Option<String>,
    pub last_logout_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn status(&self) -> AccountStatus {
        AccountStatus::parse(&self.status)
    }

    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id.clone(),
            user_id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            status: self.status(),
        }
    }
}

/// Public account view, never carries the credential / 公开的账户信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub status: AccountStatus,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FavoriteRow {
    pub email: String,
    pub favorite_id: String,
    pub note: Option<String>,
    pub data: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_record_uses_document_keys() {
        let record = ServiceRecord {
            id: 1,
            place_of_service: "Office".to_string(),
            type_of_service: "Cardiology".to_string(),
            allowed_charges_per_person: 512.5,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["Place_of_Service"], "Office");
        assert_eq!(value["Type_of_Service"], "Cardiology");
        assert_eq!(value["Allowed_Charges_Per_Person"], 512.5);
    }

    #[test]
    fn test_profile_hides_password() {
        let user = User {
            id: "u1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$2b$10$secret".to_string(),
            status: "loggedin".to_string(),
            last_login_at: None,
            last_logout_at: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let user_json = serde_json::to_value(&user).unwrap();
        assert!(user_json.get("password_hash").is_none());

        let profile = serde_json::to_value(user.profile()).unwrap();
        assert_eq!(
            profile,
            json!({
                "id": "u1",
                "userId": "u1",
                "firstName": "Ada",
                "lastName": "Lovelace",
                "email": "ada@example.com",
                "status": "loggedin"
            })
        );
    }

    #[test]
    fn test_unknown_status_reads_signed_out() {
        assert_eq!(AccountStatus::parse("loggedin"), AccountStatus::SignedIn);
        assert_eq!(AccountStatus::parse(""), AccountStatus::SignedOut);
        assert_eq!(AccountStatus::SignedOut.as_str(), "loggedout");
    }
}
