use crate::wire::HealthRes;

/// Simple health service shared by the story APIs.
///
/// This service provides a standardised way to check that the story service is up.
pub struct HealthService;

impl HealthService {
    /// Static method to check health without creating an instance
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "Story service is alive".into(),
        }
    }
}
