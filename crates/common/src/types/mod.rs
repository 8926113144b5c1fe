use serde::Serialize;

/// Liveness payload served on `/health`.
#[derive(Serialize, Debug)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}
