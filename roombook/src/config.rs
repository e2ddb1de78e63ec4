use serde::Deserialize;
use std::env;

use crate::error::{Result, RoombookError};

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

/// Reads a string variable, treating an empty value as unset.
fn env_non_empty(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(var: &str, default: &str) -> String {
    env_non_empty(var).unwrap_or_else(|| default.to_string())
}

pub const DEFAULT_LOGIN_URL: &str = "https://uis.shou.edu.cn/token/password/passwordLogin";
pub const DEFAULT_PORTAL_BASE_URL: &str = "https://meeting-reservation.shou.edu.cn/api";
pub const DEFAULT_USER_AGENT: &str = "SWSuperApp/1.0.19 (iPad; iOS 18.0; Scale/2.00)";
pub const DEFAULT_PROJECT_ID: &str = "1800403370013822977";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub portal: PortalConfig,
    pub credentials: Credentials,
    pub booking: BookingConfig,
    pub applicant: ApplicantProfile,
    pub ocr: OcrConfig,
}

/// Endpoints and transport settings of the reservation portal.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    pub login_url: String,
    /// Prefix of every reservation API route, e.g. `https://host/api`.
    pub base_url: String,
    pub user_agent: String,
    pub project_id: String,
    pub timeout_secs: u64,
}

impl PortalConfig {
    pub fn captcha_url(&self, room_id: &str) -> String {
        format!("{}/room/captcha/{}", self.base_url.trim_end_matches('/'), room_id)
    }

    pub fn reservation_url(&self) -> String {
        format!("{}/reservation", self.base_url.trim_end_matches('/'))
    }

    pub fn query_url(&self) -> String {
        format!("{}/home/reserve4site", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Token persisted by a previous run; reused until the portal rejects it.
    pub token: Option<String>,
}

/// What to book and how hard to try.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub max_attempts: u32,
    pub room_id: Option<String>,
    pub apply_date: Option<String>,
    pub begin_time: Option<String>,
    pub end_time: Option<String>,
}

/// Static applicant fields sent with every reservation.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicantProfile {
    pub leader_name: String,
    pub leader_id: String,
    pub leader_no: String,
    pub applicant: String,
    pub applicant_label: String,
    pub phone: String,
    pub subject: String,
    pub seat_count: u32,
    pub use_rule_id: String,
    pub allow_agent_ra: u8,
    pub remark: String,
}

impl ApplicantProfile {
    /// Env vars of identifying fields that are still blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("APPLICANT_LEADER_NAME", &self.leader_name),
            ("APPLICANT_LEADER_ID", &self.leader_id),
            ("APPLICANT_LEADER_NO", &self.leader_no),
            ("APPLICANT_ID", &self.applicant),
            ("APPLICANT_LABEL", &self.applicant_label),
            ("APPLICANT_PHONE", &self.phone),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(var, _)| var)
        .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub languages: String,
    pub timeout_secs: u64,
    pub max_image_dimension: u32,
    /// Captchas shorter than this are upscaled before recognition.
    pub min_image_dimension: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model: "local/tesseract".to_string(),
            api_key: None,
            base_url: None,
            languages: "eng".to_string(),
            timeout_secs: 30,
            max_image_dimension: 1024,
            min_image_dimension: 64,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let ocr_defaults = OcrConfig::default();

        Self {
            portal: PortalConfig {
                login_url: env_or("PORTAL_LOGIN_URL", DEFAULT_LOGIN_URL),
                base_url: env_or("PORTAL_BASE_URL", DEFAULT_PORTAL_BASE_URL),
                user_agent: env_or("PORTAL_USER_AGENT", DEFAULT_USER_AGENT),
                project_id: env_or("PORTAL_PROJECT_ID", DEFAULT_PROJECT_ID),
                timeout_secs: parse_env_or("PORTAL_TIMEOUT", 30),
            },
            credentials: Credentials {
                username: env_non_empty("USERNAME").unwrap_or_default(),
                password: env_non_empty("PASSWORD").unwrap_or_default(),
                token: env_non_empty("TOKEN"),
            },
            booking: BookingConfig {
                max_attempts: parse_env_or("BOOKING_MAX_ATTEMPTS", 3),
                room_id: env_non_empty("ROOM_ID"),
                apply_date: env_non_empty("APPLY_DATE"),
                begin_time: env_non_empty("BEGIN_TIME"),
                end_time: env_non_empty("END_TIME"),
            },
            applicant: ApplicantProfile {
                leader_name: env_or("APPLICANT_LEADER_NAME", ""),
                leader_id: env_or("APPLICANT_LEADER_ID", ""),
                leader_no: env_or("APPLICANT_LEADER_NO", ""),
                applicant: env_or("APPLICANT_ID", ""),
                applicant_label: env_or("APPLICANT_LABEL", ""),
                phone: env_or("APPLICANT_PHONE", ""),
                subject: env_or("APPLICANT_SUBJECT", "羽毛球运动"),
                seat_count: parse_env_or("APPLICANT_SEAT_COUNT", 4),
                use_rule_id: env_or("APPLICANT_USE_RULE_ID", "1836673554756079618"),
                allow_agent_ra: parse_env_or("APPLICANT_ALLOW_AGENT_RA", 0),
                remark: env_or("APPLICANT_REMARK", ""),
            },
            ocr: OcrConfig {
                model: env_or("OCR_MODEL", &ocr_defaults.model),
                api_key: env_non_empty("OCR_API_KEY"),
                base_url: env_non_empty("OCR_BASE_URL"),
                languages: env_or("OCR_LANGUAGES", &ocr_defaults.languages),
                timeout_secs: parse_env_or("OCR_TIMEOUT", ocr_defaults.timeout_secs),
                max_image_dimension: parse_env_or(
                    "OCR_MAX_DIMENSION",
                    ocr_defaults.max_image_dimension,
                ),
                min_image_dimension: parse_env_or(
                    "OCR_MIN_DIMENSION",
                    ocr_defaults.min_image_dimension,
                ),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Checks that a session can be established with what was loaded.
    pub fn validate(&self) -> Result<()> {
        let has_token = self.credentials.token.is_some();
        let has_login =
            !self.credentials.username.is_empty() && !self.credentials.password.is_empty();
        if !has_token && !has_login {
            return Err(RoombookError::Config(
                "USERNAME and PASSWORD are required when no TOKEN is cached".to_string(),
            ));
        }
        if self.booking.max_attempts == 0 {
            return Err(RoombookError::Config(
                "BOOKING_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        let missing = self.applicant.missing_fields();
        if !missing.is_empty() {
            return Err(RoombookError::Config(format!(
                "applicant profile incomplete, set {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    const APPLICANT_VARS: [&str; 6] = [
        "APPLICANT_LEADER_NAME",
        "APPLICANT_LEADER_ID",
        "APPLICANT_LEADER_NO",
        "APPLICANT_ID",
        "APPLICANT_LABEL",
        "APPLICANT_PHONE",
    ];

    fn clear_credentials() {
        std::env::remove_var("USERNAME");
        std::env::remove_var("PASSWORD");
        std::env::remove_var("TOKEN");
    }

    fn set_applicant_env() {
        for var in APPLICANT_VARS {
            std::env::set_var(var, "x");
        }
    }

    fn clear_applicant_env() {
        for var in APPLICANT_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_portal_defaults() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        std::env::remove_var("PORTAL_BASE_URL");
        std::env::remove_var("PORTAL_TIMEOUT");

        let config = Config::default();
        assert_eq!(config.portal.base_url, DEFAULT_PORTAL_BASE_URL);
        assert_eq!(config.portal.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.portal.timeout_secs, 30);
        assert_eq!(
            config.portal.captcha_url("42"),
            "https://meeting-reservation.shou.edu.cn/api/room/captcha/42"
        );
    }

    #[test]
    fn test_portal_urls_ignore_trailing_slash() {
        let portal = PortalConfig {
            login_url: DEFAULT_LOGIN_URL.to_string(),
            base_url: "http://localhost:8080/api/".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            project_id: DEFAULT_PROJECT_ID.to_string(),
            timeout_secs: 5,
        };
        assert_eq!(portal.reservation_url(), "http://localhost:8080/api/reservation");
        assert_eq!(portal.query_url(), "http://localhost:8080/api/home/reserve4site");
    }

    #[test]
    fn test_booking_max_attempts_defaults_to_three() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        std::env::remove_var("BOOKING_MAX_ATTEMPTS");
        let config = Config::default();
        assert_eq!(config.booking.max_attempts, 3);
    }

    #[test]
    fn test_invalid_max_attempts_falls_back() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        std::env::set_var("BOOKING_MAX_ATTEMPTS", "many");
        let config = Config::default();
        assert_eq!(config.booking.max_attempts, 3);
        std::env::remove_var("BOOKING_MAX_ATTEMPTS");
    }

    #[test]
    fn test_empty_token_is_treated_as_missing() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_credentials();
        std::env::set_var("TOKEN", "");
        let config = Config::default();
        assert!(config.credentials.token.is_none());
        clear_credentials();
    }

    #[test]
    fn test_validate_requires_credentials_without_token() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_credentials();
        set_applicant_env();
        let config = Config::default();
        assert!(config.validate().is_err());

        std::env::set_var("TOKEN", "cached-token");
        let config = Config::default();
        assert!(config.validate().is_ok());
        clear_credentials();
        clear_applicant_env();
    }

    #[test]
    fn test_validate_requires_applicant_identity() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_credentials();
        clear_applicant_env();
        std::env::set_var("TOKEN", "cached-token");
        std::env::set_var("APPLICANT_LEADER_NAME", "张三");
        std::env::set_var("APPLICANT_PHONE", "13800000000");

        let config = Config::default();
        assert_eq!(
            config.applicant.missing_fields(),
            vec![
                "APPLICANT_LEADER_ID",
                "APPLICANT_LEADER_NO",
                "APPLICANT_ID",
                "APPLICANT_LABEL"
            ]
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("APPLICANT_LEADER_ID"));
        assert!(!err.to_string().contains("APPLICANT_PHONE"));

        set_applicant_env();
        assert!(Config::default().validate().is_ok());
        clear_credentials();
        clear_applicant_env();
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_credentials();
        std::env::set_var("USERNAME", "alice");
        std::env::set_var("PASSWORD", "secret");
        let mut config = Config::default();
        config.booking.max_attempts = 0;
        assert!(config.validate().is_err());
        clear_credentials();
    }

    #[test]
    fn test_applicant_profile_from_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        std::env::set_var("APPLICANT_SEAT_COUNT", "8");
        std::env::set_var("APPLICANT_SUBJECT", "篮球");
        let config = Config::default();
        assert_eq!(config.applicant.seat_count, 8);
        assert_eq!(config.applicant.subject, "篮球");
        std::env::remove_var("APPLICANT_SEAT_COUNT");
        std::env::remove_var("APPLICANT_SUBJECT");
    }

    #[test]
    fn test_parse_env_or_valid_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        std::env::set_var("__TEST_PARSE_TIMEOUT", "12");
        let result: u64 = parse_env_or("__TEST_PARSE_TIMEOUT", 30);
        assert_eq!(result, 12);
        std::env::remove_var("__TEST_PARSE_TIMEOUT");
    }
}
