use serde::Deserialize;

/// Fields are optional so a missing field reads as "required" instead of a body rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Logout and session-probe body / 登出与会话检查请求
#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: Option<String>,
}

/// Non-empty value of an optional field / 取非空字段值
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
