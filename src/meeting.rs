use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

pub const CALL_PENDING: &str = "Pendiente";
pub const CALL_STATES: [&str; 4] = ["Pendiente", "En curso", "Finalizada", "Cancelada"];

pub fn is_call_state(raw: &str) -> bool {
    CALL_STATES.contains(&raw)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MeetingError {
    #[error("meeting links are not configured")]
    NotConfigured,
    #[error("meeting base url must be http(s): {0}")]
    InvalidBaseUrl(String),
}

/// Builds video-call room links for virtual consultations.
#[derive(Debug, Clone)]
pub struct MeetingLinks {
    base_url: Option<String>,
}

impl MeetingLinks {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    pub fn disabled() -> Self {
        Self { base_url: None }
    }

    pub fn generate(&self, consultation_id: i32) -> Result<String, MeetingError> {
        let base = self.base_url.as_deref().ok_or(MeetingError::NotConfigured)?;
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(MeetingError::InvalidBaseUrl(base.to_string()));
        }

        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        Ok(format!("{base}/consulta-{consultation_id}-{token}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_embeds_consultation_id_under_base() {
        let links = MeetingLinks::new(Some("https://meet.example.org/".into()));
        let url = links.generate(42).unwrap();
        let room = url.strip_prefix("https://meet.example.org/consulta-42-").unwrap();
        assert_eq!(room.len(), 16);
        assert!(room.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn each_link_is_fresh() {
        let links = MeetingLinks::new(Some("https://meet.example.org".into()));
        assert_ne!(links.generate(1).unwrap(), links.generate(1).unwrap());
    }

    #[test]
    fn fails_without_usable_base() {
        assert_eq!(MeetingLinks::disabled().generate(1), Err(MeetingError::NotConfigured));
        assert!(matches!(
            MeetingLinks::new(Some("ftp://x".into())).generate(1),
            Err(MeetingError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn call_states() {
        assert!(is_call_state("En curso"));
        assert!(!is_call_state("en curso"));
    }
}
