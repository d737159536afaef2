pub mod shutdown;
pub mod types;
pub mod utils;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_type_ok() {
        let h = types::Health { status: "ok" };
        assert_eq!(serde_json::to_value(&h).unwrap(), serde_json::json!({"status": "ok"}));
    }

    #[test]
    fn message_body_serializes_message_only() {
        let m = types::MessageBody::new("API is running...");
        assert_eq!(serde_json::to_value(&m).unwrap(), serde_json::json!({"message": "API is running..."}));
    }
}
