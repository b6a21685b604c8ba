use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{
    geo::{GeoError, GeoJsonPoint, GeoPoint},
    models::usermodel::{Location, User, UserRole},
};

pub const MAX_GUARDIAN_EMAILS: usize = 5;

fn is_guardian_email(email: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w\-\.]+@([\w-]+\.)+[\w-]{2,4}$").ok())
        .as_ref()
        .map_or(false, |re| re.is_match(email))
}

pub fn validate_mobile(mobile: &str) -> Result<(), ValidationError> {
    if mobile.len() == 10 && mobile.chars().all(|c| c.is_ascii_digit()) {
        return Ok(());
    }
    let mut err = ValidationError::new("mobile");
    err.message = Some("Mobile number must be exactly 10 digits".into());
    Err(err)
}

pub fn validate_guardian_emails(emails: &[String]) -> Result<(), ValidationError> {
    if emails.len() > MAX_GUARDIAN_EMAILS {
        let mut err = ValidationError::new("guardian_emails");
        err.message = Some(format!("At most {} guardian emails are allowed", MAX_GUARDIAN_EMAILS).into());
        return Err(err);
    }
    if let Some(invalid) = emails.iter().find(|e| !is_guardian_email(e)) {
        let mut err = ValidationError::new("guardian_emails");
        err.message = Some(format!("Invalid guardian email: {}", invalid).into());
        return Err(err);
    }
    Ok(())
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LocationDto {
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "District is required"))]
    pub district: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
}

impl From<LocationDto> for Location {
    fn from(dto: LocationDto) -> Self {
        Location {
            state: dto.state,
            district: dto.district,
            city: dto.city,
        }
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegisterUserDto {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(
        length(min = 1, message = "Password is required"),
        length(min = 6, message = "Password must be at least 6 characters")
    )]
    pub password: String,

    #[validate(
        length(min = 1, message = "Confirm Password is required"),
        must_match(other = "password", message = "passwords do not match")
    )]
    #[serde(rename = "passwordConfirm")]
    pub password_confirm: String,

    #[validate(custom = "validate_mobile")]
    pub mobile: String,

    #[validate]
    pub location: LocationDto,

    #[serde(deserialize_with = "super::coordinate")]
    pub longitude: f64,
    #[serde(deserialize_with = "super::coordinate")]
    pub latitude: f64,

    #[serde(default)]
    pub other_contact: Vec<String>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(length(min = 1, message = "Email is required"), email(message = "Email is invalid"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateProfileDto {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,

    #[validate(custom = "validate_mobile")]
    pub mobile: Option<String>,

    #[validate]
    pub location: Option<LocationDto>,

    pub other_contact: Option<Vec<String>>,

    #[validate(custom = "validate_guardian_emails")]
    pub guardian_emails: Option<Vec<String>>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct GuardianEmailsDto {
    #[validate(custom = "validate_guardian_emails")]
    pub guardian_emails: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FilterUserDto {
    pub id: String,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub role: String,
    pub location: Location,
    pub point: GeoJsonPoint,
    pub guardian_emails: Vec<String>,
    pub other_contact: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: user.id.to_string(),
            name: user.name.to_owned(),
            email: user.email.to_owned(),
            mobile: user.mobile.to_owned(),
            role: UserRole::User.to_str().to_string(),
            location: user.location(),
            point: GeoJsonPoint::new(user.longitude, user.latitude),
            guardian_emails: user.guardian_emails.clone(),
            other_contact: user.other_contact.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// What a provider gets to see about the person it is helping.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserContactDto {
    pub id: String,
    pub name: String,
    pub mobile: String,
    pub location: Location,
}

impl UserContactDto {
    pub fn from_user(user: &User) -> Self {
        UserContactDto {
            id: user.id.to_string(),
            name: user.name.to_owned(),
            mobile: user.mobile.to_owned(),
            location: user.location(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserData {
    pub user: FilterUserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponseDto {
    pub status: String,
    pub data: UserData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserLoginResponseDto {
    pub status: String,
    pub role: String,
    pub token: String,
}

#[derive(Serialize, Deserialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}

impl RegisterUserDto {
    pub fn point(&self) -> Result<GeoPoint, GeoError> {
        GeoPoint::new(self.longitude, self.latitude)
    }
}

/// `?longitude=..&latitude=..`. Range checks happen in [`GeoPoint::new`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointQueryDto {
    #[serde(deserialize_with = "super::coordinate")]
    pub longitude: f64,
    #[serde(deserialize_with = "super::coordinate")]
    pub latitude: f64,
}

impl PointQueryDto {
    pub fn point(&self) -> Result<GeoPoint, GeoError> {
        GeoPoint::new(self.longitude, self.latitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_dto() -> RegisterUserDto {
        RegisterUserDto {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            password: "password123".to_string(),
            password_confirm: "password123".to_string(),
            mobile: "9876543210".to_string(),
            location: LocationDto {
                state: "Karnataka".to_string(),
                district: "Bangalore Urban".to_string(),
                city: "Bangalore".to_string(),
            },
            longitude: 77.5946,
            latitude: 12.9716,
            other_contact: vec![],
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(register_dto().validate().is_ok());
    }

    #[test]
    fn mobile_must_be_ten_digits() {
        let mut dto = register_dto();
        dto.mobile = "98765".to_string();
        assert!(dto.validate().is_err());
        dto.mobile = "98765432ab".to_string();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn registration_rejects_bad_coordinates_and_mismatched_passwords() {
        let mut dto = register_dto();
        dto.latitude = 95.0;
        assert!(dto.validate().is_ok());
        assert_eq!(dto.point(), Err(GeoError::InvalidLatitude(95.0)));

        let mut dto = register_dto();
        dto.password_confirm = "different".to_string();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn guardian_emails_are_checked() {
        let ok = GuardianEmailsDto {
            guardian_emails: vec!["mom@example.com".to_string(), "dad.k@mail.co.in".to_string()],
        };
        assert!(ok.validate().is_ok());

        let bad = GuardianEmailsDto {
            guardian_emails: vec!["not-an-email".to_string()],
        };
        assert!(bad.validate().is_err());

        let too_many = GuardianEmailsDto {
            guardian_emails: (0..6).map(|i| format!("g{}@example.com", i)).collect(),
        };
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn filtered_user_has_no_password_and_geojson_point() {
        let user = User {
            id: uuid::Uuid::new_v4(),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            mobile: "9876543210".to_string(),
            state: "Karnataka".to_string(),
            district: "Bangalore Urban".to_string(),
            city: "Bangalore".to_string(),
            longitude: 77.5946,
            latitude: 12.9716,
            guardian_emails: vec![],
            other_contact: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(FilterUserDto::filter_user(&user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["point"]["type"], "Point");
        assert_eq!(json["point"]["coordinates"][0], 77.5946);
        assert_eq!(json["role"], "user");
    }
}
