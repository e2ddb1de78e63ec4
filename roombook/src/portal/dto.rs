//! Wire records for the login and reservation endpoints.

use serde::{Deserialize, Serialize};

use crate::config::ApplicantProfile;
use crate::models::ReservationSlot;

pub const LOGIN_APP_ID: &str = "com.supwisdom.ahd";
pub const LOGIN_CLIENT_ID: &str = "CLIENT_ID";
pub const LOGIN_DEVICE_ID: &str = "BBE18D7D-6696-4B4C-828B-348A116CD485";
pub const LOGIN_MFA_STATE: &str = "9zT101";
pub const LOGIN_OS_TYPE: &str = "iOS";

/// Success code of the auth endpoint.
pub const LOGIN_OK: i64 = 0;
/// Success code of the reservation API.
pub const API_OK: i64 = 200;

const UNKNOWN_ERROR: &str = "未知错误";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm<'a> {
    pub app_id: &'a str,
    pub client_id: &'a str,
    pub device_id: &'a str,
    pub mfa_state: &'a str,
    pub os_type: &'a str,
    pub password: &'a str,
    pub username: &'a str,
}

impl<'a> LoginForm<'a> {
    pub fn new(username: &'a str, password: &'a str) -> Self {
        Self {
            app_id: LOGIN_APP_ID,
            client_id: LOGIN_CLIENT_ID,
            device_id: LOGIN_DEVICE_ID,
            mfa_state: LOGIN_MFA_STATE,
            os_type: LOGIN_OS_TYPE,
            password,
            username,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub code: i64,
    #[serde(default)]
    pub data: Option<LoginData>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    #[serde(rename = "idToken", default)]
    pub id_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationQuery<'a> {
    pub project_id: &'a str,
    pub date: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CaptchaResponse {
    pub code: i64,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl CaptchaResponse {
    pub fn message(&self) -> &str {
        self.msg.as_deref().unwrap_or(UNKNOWN_ERROR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyExtend {
    pub end_time: String,
    pub apply_date: String,
    pub begin_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub leader_name: String,
    pub leader_id: String,
    pub captcha: String,
    pub apply_extend_list: Vec<ApplyExtend>,
    pub subject: String,
    pub applicant: String,
    pub room_id: String,
    pub allow_agent_ra: u8,
    pub seat_count: u32,
    pub phone: String,
    pub leader_no: String,
    pub use_rule_id: String,
    pub remark: String,
    pub applicant_label: String,
}

impl ReservationRequest {
    pub fn new(profile: &ApplicantProfile, slot: &ReservationSlot, captcha: &str) -> Self {
        Self {
            leader_name: profile.leader_name.clone(),
            leader_id: profile.leader_id.clone(),
            captcha: captcha.to_string(),
            apply_extend_list: vec![ApplyExtend {
                end_time: slot.end_time.clone(),
                apply_date: slot.apply_date.clone(),
                begin_time: slot.begin_time.clone(),
            }],
            subject: profile.subject.clone(),
            applicant: profile.applicant.clone(),
            room_id: slot.room_id.clone(),
            allow_agent_ra: profile.allow_agent_ra,
            seat_count: profile.seat_count,
            phone: profile.phone.clone(),
            leader_no: profile.leader_no.clone(),
            use_rule_id: profile.use_rule_id.clone(),
            remark: profile.remark.clone(),
            applicant_label: profile.applicant_label.clone(),
        }
    }
}

/// Response of the submission endpoint. The portal reports its text under
/// `msg` on most paths and `message` on some.
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ReservationResponse {
    pub fn message(&self) -> &str {
        self.msg
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or(UNKNOWN_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn profile() -> ApplicantProfile {
        ApplicantProfile {
            leader_name: "张三".to_string(),
            leader_id: "leader-1".to_string(),
            leader_no: "M001".to_string(),
            applicant: "100500".to_string(),
            applicant_label: "信息学院".to_string(),
            phone: "13800000000".to_string(),
            subject: "羽毛球运动".to_string(),
            seat_count: 4,
            use_rule_id: "rule-9".to_string(),
            allow_agent_ra: 0,
            remark: String::new(),
        }
    }

    #[test]
    fn test_reservation_request_wire_shape() {
        let slot = ReservationSlot::new("room-7", "2024-10-16", "18:00", "18:30").unwrap();
        let request = ReservationRequest::new(&profile(), &slot, "ab12");

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "leaderName": "张三",
                "leaderId": "leader-1",
                "captcha": "ab12",
                "applyExtendList": [
                    {"endTime": "18:30", "applyDate": "2024-10-16", "beginTime": "18:00"}
                ],
                "subject": "羽毛球运动",
                "applicant": "100500",
                "roomId": "room-7",
                "allowAgentRa": 0,
                "seatCount": 4,
                "phone": "13800000000",
                "leaderNo": "M001",
                "useRuleId": "rule-9",
                "remark": "",
                "applicantLabel": "信息学院"
            })
        );
    }

    #[test]
    fn test_login_form_field_names() {
        let form = LoginForm::new("alice", "secret");
        let value = serde_json::to_value(&form).unwrap();
        assert_eq!(value["appId"], LOGIN_APP_ID);
        assert_eq!(value["deviceId"], LOGIN_DEVICE_ID);
        assert_eq!(value["mfaState"], LOGIN_MFA_STATE);
        assert_eq!(value["osType"], "iOS");
        assert_eq!(value["username"], "alice");
    }

    #[test]
    fn test_login_response_with_null_data() {
        let resp: LoginResponse =
            serde_json::from_value(json!({"code": 1, "data": null, "message": "密码错误"}))
                .unwrap();
        assert_eq!(resp.code, 1);
        assert!(resp.data.is_none());
    }

    #[test]
    fn test_response_message_prefers_msg() {
        let resp: ReservationResponse =
            serde_json::from_value(json!({"code": 400, "msg": "a", "message": "b"})).unwrap();
        assert_eq!(resp.message(), "a");

        let resp: ReservationResponse =
            serde_json::from_value(json!({"code": 500, "message": "b"})).unwrap();
        assert_eq!(resp.message(), "b");

        let resp: ReservationResponse = serde_json::from_value(json!({"code": 500})).unwrap();
        assert_eq!(resp.message(), "未知错误");
    }

    #[test]
    fn test_response_without_code_fails_to_parse() {
        let result = serde_json::from_value::<ReservationResponse>(json!({"msg": "ok"}));
        assert!(result.is_err());
    }
}
