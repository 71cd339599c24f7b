#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("service pattern not found: {0}")]
    PatternNotFound(String),
    #[error("service pattern {0} has no validity period")]
    MissingValidityPeriod(String),
    #[error("failed to generate calendar for service {service_id}")]
    Generation {
        service_id: String,
        #[source]
        source: Box<CalendarError>,
    },
}

impl CalendarError {
    pub(crate) fn generation(service_id: impl Into<String>, source: CalendarError) -> Self {
        CalendarError::Generation {
            service_id: service_id.into(),
            source: Box::new(source),
        }
    }
}

pub type CalendarResult<T> = Result<T, CalendarError>;
