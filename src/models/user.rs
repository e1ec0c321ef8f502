use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub email: String,
    pub schedule: Option<serde_json::Value>,
    pub picture: Option<String>,
    pub description: Option<String>,
    pub subscribed: bool,
    pub settings: serde_json::Value,
    pub stripe_account: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Fields accepted when registering a user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub email: String,
    pub schedule: Option<serde_json::Value>,
    pub picture: Option<String>,
}

/// Partial profile update. An absent field (`None`) leaves the stored value
/// untouched; an explicit `null` (`Some(None)`) clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, deserialize_with = "present")]
    pub company_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub picture: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.company_name.is_none()
            && self.phone.is_none()
            && self.description.is_none()
            && self.picture.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_null_differs_from_absent() {
        let update: ProfileUpdate =
            serde_json::from_str(r#"{"description": null, "phone": "+15550002222"}"#).unwrap();

        assert_eq!(update.description, Some(None));
        assert_eq!(update.phone, Some(Some("+15550002222".to_string())));
        assert_eq!(update.company_name, None);
        assert!(!update.is_empty());

        let empty: ProfileUpdate = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
