use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GenericResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ReplayResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub report: crate::replay::ReplayReport,
}
