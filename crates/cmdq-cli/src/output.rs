use serde::Serialize;

const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// JSON envelope written for every `cmdq` invocation.
#[derive(Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    pub api_version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> CliResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            api_version: API_VERSION,
            data: Some(data),
            error: None,
        }
    }
}

impl CliResponse<()> {
    fn failed(message: &str) -> Self {
        Self {
            success: false,
            api_version: API_VERSION,
            data: None,
            error: Some(message.to_string()),
        }
    }
}

#[derive(Serialize)]
pub struct ListResponse<T: Serialize> {
    pub items: Vec<T>,
    pub count: usize,
}

impl<T: Serialize> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

pub fn output_success<T: Serialize>(data: T) {
    match serde_json::to_string(&CliResponse::ok(data)) {
        Ok(json) => println!("{}", json),
        Err(e) => output_error(&format!("failed to serialize response: {}", e)),
    }
}

pub fn output_list<T: Serialize>(items: Vec<T>) {
    output_success(ListResponse::from(items));
}

/// Writes the failure envelope to stderr and exits with status 1.
pub fn output_error(message: &str) -> ! {
    match serde_json::to_string(&CliResponse::failed(message)) {
        Ok(json) => eprintln!("{}", json),
        Err(_) => eprintln!("{}", message),
    }
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_envelope_omits_data() {
        let json = serde_json::to_value(CliResponse::failed("queue row 9 not found")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "queue row 9 not found");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_list_envelope_counts_items() {
        let json = serde_json::to_value(CliResponse::ok(ListResponse::from(vec!["a", "b"])))
            .unwrap();
        assert_eq!(json["data"]["count"], 2);
        assert_eq!(json["data"]["items"][1], "b");
        assert!(json.get("error").is_none());
    }
}
