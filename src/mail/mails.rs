use chrono::{DateTime, Utc};

use super::sendmail::{send_email, MailError};
use crate::{config::SmtpConfig, geo::GeoPoint, models::usermodel::Location};

pub const EMERGENCY_ALERT_TEMPLATE: &str = "src/mail/templates/Emergency-alert.html";

pub fn google_maps_link(point: &GeoPoint) -> String {
    format!(
        "https://www.google.com/maps?q={},{}",
        point.latitude(),
        point.longitude()
    )
}

pub fn emergency_alert_subject(username: &str) -> String {
    format!("EMERGENCY ALERT: {} needs help!", username)
}

pub fn emergency_alert_placeholders(
    username: &str,
    mobile: &str,
    location: &Location,
    point: &GeoPoint,
    raised_at: DateTime<Utc>,
) -> Vec<(String, String)> {
    vec![
        ("{{username}}".to_string(), username.to_string()),
        ("{{mobile}}".to_string(), mobile.to_string()),
        ("{{city}}".to_string(), location.city.clone()),
        ("{{district}}".to_string(), location.district.clone()),
        ("{{state}}".to_string(), location.state.clone()),
        (
            "{{time}}".to_string(),
            raised_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
        ("{{map_link}}".to_string(), google_maps_link(point)),
    ]
}

pub async fn send_emergency_alert_email(
    smtp: &SmtpConfig,
    to_email: &str,
    username: &str,
    mobile: &str,
    location: &Location,
    point: &GeoPoint,
    raised_at: DateTime<Utc>,
) -> Result<(), MailError> {
    let subject = emergency_alert_subject(username);
    let placeholders = emergency_alert_placeholders(username, mobile, location, point, raised_at);

    send_email(smtp, to_email, &subject, EMERGENCY_ALERT_TEMPLATE, &placeholders).await
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::mail::sendmail::render_template;

    #[test]
    fn map_link_is_latitude_first() {
        let point = GeoPoint::new(77.5946, 12.9716).unwrap();
        assert_eq!(
            google_maps_link(&point),
            "https://www.google.com/maps?q=12.9716,77.5946"
        );
    }

    #[test]
    fn alert_template_is_fully_rendered() {
        let point = GeoPoint::new(77.5946, 12.9716).unwrap();
        let location = Location {
            state: "Karnataka".to_string(),
            district: "Bangalore Urban".to_string(),
            city: "Bangalore".to_string(),
        };
        let raised_at = Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap();

        let placeholders =
            emergency_alert_placeholders("Asha", "9876543210", &location, &point, raised_at);
        let html = render_template(EMERGENCY_ALERT_TEMPLATE, &placeholders).unwrap();

        assert!(html.contains("Asha"));
        assert!(html.contains("9876543210"));
        assert!(html.contains("Bangalore Urban"));
        assert!(html.contains("2024-06-01 10:30:00 UTC"));
        assert!(html.contains("https://www.google.com/maps?q=12.9716,77.5946"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn subject_names_the_user() {
        assert_eq!(emergency_alert_subject("Asha"), "EMERGENCY ALERT: Asha needs help!");
    }
}
