use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

/// Wrapper for API responses that adds the `{success, data, message}` envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub message: Option<String>,
    pub status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 OK with data
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
            status_code: StatusCode::OK,
        }
    }

    /// 201 Created response
    pub fn created(data: T) -> Self {
        Self {
            data,
            message: None,
            status_code: StatusCode::CREATED,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": true,
            "data": self.data,
        });
        if let Some(message) = self.message {
            body["message"] = json!(message);
        }
        (self.status_code, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_uses_201() {
        let resp = ApiResponse::created(json!({"id": 1}));
        assert_eq!(resp.status_code, StatusCode::CREATED);
    }

    #[test]
    fn message_is_optional() {
        let resp = ApiResponse::success(json!([])).with_message("Imported 3 rows");
        assert_eq!(resp.message.as_deref(), Some("Imported 3 rows"));
    }
}
