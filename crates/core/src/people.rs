//! Typed person records and display-name normalisation.
//!
//! Patient and doctor documents from the backend come in several shapes: sometimes the name
//! sits on the document itself, sometimes on a nested `user` object, sometimes split into first
//! and last names, sometimes only an email is present. [`PersonRecord`] models all of those as
//! explicit optional fields and [`PersonRecord::display_name`] is the single place that decides
//! what to show.

use crate::client::RemoteClient;
use crate::wire::{decode, first_id, single_payload, IdRef};
use crate::{HmsError, HmsResult};
use serde::Deserialize;
use serde_json::Value;

/// Shown when a record carries no usable name or email.
pub const UNKNOWN_PERSON: &str = "Unknown";

/// A patient, doctor or staff document with every naming field optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersonRecord {
    pub id: Option<String>,
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Linked account document, when the backend populates it.
    pub user: Option<Box<PersonRecord>>,
}

impl PersonRecord {
    /// Decode a person document, or a bare id reference to one.
    pub fn from_value(value: &Value) -> HmsResult<Self> {
        match value {
            Value::String(_) | Value::Number(_) => {
                let id: IdRef = decode(value, "person reference")?;
                Ok(Self {
                    id: id.into_id(),
                    ..Self::default()
                })
            }
            Value::Object(_) => {
                let wire: PersonWire = decode(value, "person")?;
                Ok(wire.into())
            }
            _ => Err(HmsError::Decode("person is not a document or id".into())),
        }
    }

    /// The one name to show for this person.
    ///
    /// Order: the linked user's name, the record's own name, the linked user's email, the
    /// record's own email, then [`UNKNOWN_PERSON`].
    pub fn display_name(&self) -> String {
        let user = self.user.as_deref();
        user.and_then(PersonRecord::own_name)
            .or_else(|| self.own_name())
            .or_else(|| user.and_then(|u| non_blank(u.email.as_deref())))
            .or_else(|| non_blank(self.email.as_deref()))
            .unwrap_or_else(|| UNKNOWN_PERSON.to_string())
    }

    /// Phone number from the record or its linked user.
    pub fn contact_phone(&self) -> Option<String> {
        non_blank(self.phone.as_deref())
            .or_else(|| self.user.as_deref().and_then(|u| non_blank(u.phone.as_deref())))
    }

    fn own_name(&self) -> Option<String> {
        non_blank(self.full_name.as_deref())
            .or_else(|| non_blank(self.name.as_deref()))
            .or_else(|| {
                let parts: Vec<String> = [self.first_name.as_deref(), self.last_name.as_deref()]
                    .into_iter()
                    .filter_map(non_blank)
                    .collect();
                (!parts.is_empty()).then(|| parts.join(" "))
            })
    }
}

/// Fetch one person document, e.g. `GET /patients/{id}` or `GET /doctors/{id}`.
pub async fn fetch_person(
    client: &dyn RemoteClient,
    collection: &str,
    id: &str,
) -> HmsResult<PersonRecord> {
    let response = client.get(&format!("{collection}/{id}"), &[]).await?;
    PersonRecord::from_value(single_payload(
        &response.data,
        &["data", "patient", "doctor", "user"],
    ))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonWire {
    #[serde(default, rename = "_id")]
    stored_id: Option<IdRef>,
    #[serde(default)]
    id: Option<IdRef>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    user: Option<UserWire>,
}

/// The nested `user` is either populated or just an id.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserWire {
    Populated(Box<PersonWire>),
    Reference(IdRef),
}

impl From<PersonWire> for PersonRecord {
    fn from(wire: PersonWire) -> Self {
        let user = wire.user.map(|user| match user {
            UserWire::Populated(inner) => Box::new(PersonRecord::from(*inner)),
            UserWire::Reference(id) => Box::new(PersonRecord {
                id: id.into_id(),
                ..PersonRecord::default()
            }),
        });

        PersonRecord {
            id: first_id(wire.stored_id, wire.id),
            full_name: wire.full_name,
            name: wire.name,
            first_name: wire.first_name,
            last_name: wire.last_name,
            email: wire.email,
            phone: wire.phone,
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person(value: Value) -> PersonRecord {
        PersonRecord::from_value(&value).expect("decodes")
    }

    #[test]
    fn prefers_linked_user_name() {
        let record = person(json!({
            "_id": "P1",
            "name": "Record Name",
            "user": {"_id": "U1", "name": "Amina Yusuf", "email": "amina@example.org"}
        }));
        assert_eq!(record.id.as_deref(), Some("P1"));
        assert_eq!(record.display_name(), "Amina Yusuf");
    }

    #[test]
    fn decodes_documents_with_both_id_keys() {
        let record = person(json!({
            "_id": "P1",
            "id": "P1",
            "fullName": "Grace Adeyemi",
            "user": {"_id": "U1", "id": "U1", "email": "grace@example.org"}
        }));
        assert_eq!(record.id.as_deref(), Some("P1"));
        assert_eq!(record.user.as_ref().and_then(|u| u.id.as_deref()), Some("U1"));
        assert_eq!(record.display_name(), "Grace Adeyemi");

        let virtual_only = person(json!({"id": "P2", "name": "Tomas"}));
        assert_eq!(virtual_only.id.as_deref(), Some("P2"));
    }

    #[test]
    fn joins_first_and_last_names() {
        let record = person(json!({"firstName": " Kwame ", "lastName": "Mensah"}));
        assert_eq!(record.display_name(), "Kwame Mensah");

        let only_last = person(json!({"firstName": "", "lastName": "Mensah"}));
        assert_eq!(only_last.display_name(), "Mensah");
    }

    #[test]
    fn falls_back_to_email_then_unknown() {
        let record = person(json!({"user": {"email": "desk@example.org"}, "email": "x@y.z"}));
        assert_eq!(record.display_name(), "desk@example.org");

        assert_eq!(person(json!({"name": "  "})).display_name(), UNKNOWN_PERSON);
        assert_eq!(person(json!({})).display_name(), UNKNOWN_PERSON);
    }

    #[test]
    fn unpopulated_user_reference_is_tolerated() {
        let record = person(json!({"fullName": "Dr. Lena Ortiz", "user": "U9", "phone": "555-0101"}));
        assert_eq!(record.user.as_ref().and_then(|u| u.id.as_deref()), Some("U9"));
        assert_eq!(record.display_name(), "Dr. Lena Ortiz");
        assert_eq!(record.contact_phone().as_deref(), Some("555-0101"));
    }

    #[test]
    fn bare_reference_decodes_to_id_only() {
        let record = person(json!("P42"));
        assert_eq!(record.id.as_deref(), Some("P42"));
        assert_eq!(record.display_name(), UNKNOWN_PERSON);
    }

    #[tokio::test]
    async fn fetch_person_unwraps_payload() {
        use crate::client::fake::FakeClient;

        let fake = FakeClient::new().respond(
            "GET",
            "/patients/P1",
            json!({"patient": {"_id": "P1", "user": {"firstName": "Ada", "lastName": "Obi"}}}),
        );
        let record = fetch_person(&fake, "/patients", "P1").await.unwrap();
        assert_eq!(record.display_name(), "Ada Obi");

        assert!(fetch_person(&fake, "/patients", "P2").await.is_err());
    }

    #[test]
    fn rejects_non_document_values() {
        assert!(PersonRecord::from_value(&json!([1, 2])).is_err());
        assert!(PersonRecord::from_value(&json!({"name": 7})).is_err());
    }
}
