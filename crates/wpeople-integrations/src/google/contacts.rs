use std::sync::Arc;

use serde_json::{json, Value};
use wpeople_core::config::GoogleConfig;
use wpeople_core::error::{Result, WPeopleError};
use wpeople_core::types::{
    Address, Birthday, ConnectionsPage, ContactGroup, NewContact, Person, TokenInfo,
};

use super::CredentialStore;

/// Fields written (and echoed back) by `people:createContact`.
const CREATE_PERSON_FIELDS: &str =
    "names,phoneNumbers,emailAddresses,addresses,urls,events,birthdays,userDefined";
/// Fields read for listings and single-contact lookups.
const READ_PERSON_FIELDS: &str = "names,phoneNumbers,emailAddresses,photos";
const DEFAULT_GROUP: &str = "contactGroups/myContacts";

pub struct ContactsClient {
    credentials: Arc<CredentialStore>,
    http: reqwest::Client,
    people_api: String,
    oauth_api: String,
}

impl ContactsClient {
    pub fn new(credentials: Arc<CredentialStore>, config: &GoogleConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| WPeopleError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            credentials,
            http,
            people_api: config.people_api_url.trim_end_matches('/').to_string(),
            oauth_api: config.oauth_api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Use the caller's token when given, otherwise the stored one.
    async fn access_token(&self, explicit: Option<&str>) -> Result<String> {
        match explicit.filter(|t| !t.is_empty()) {
            Some(token) => Ok(token.to_string()),
            None => Ok(self.credentials.get_token().await?.access_token),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let resp = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| WPeopleError::Request(format!("{what} request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| WPeopleError::Request(format!("{what} response read failed: {e}")))?;

        if !status.is_success() {
            return Err(WPeopleError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| WPeopleError::Decode(format!("{what} json parse failed: {e}")))
    }

    /// Create a contact, placing it in `contact.group` (created if missing)
    /// or in "My Contacts".
    pub async fn create_contact(&self, contact: &NewContact) -> Result<Person> {
        let token = self.access_token(None).await?;

        let group = match contact.group.as_deref().filter(|g| !g.trim().is_empty()) {
            None => DEFAULT_GROUP.to_string(),
            Some(name) => match self.resolve_group(name, Some(&token)).await {
                Ok(group) => group.resource_name,
                Err(e) => {
                    tracing::warn!(group = name, error = %e, "group lookup failed, using myContacts");
                    DEFAULT_GROUP.to_string()
                }
            },
        };

        let body = contact_body(contact, &group);
        let url = format!("{}/v1/people:createContact", self.people_api);
        tracing::debug!(group = %group, "creating contact");

        let data = self
            .send(
                self.http
                    .post(&url)
                    .query(&[
                        ("personFields", CREATE_PERSON_FIELDS),
                        ("sources", "READ_SOURCE_TYPE_CONTACT"),
                    ])
                    .bearer_auth(&token)
                    .json(&body),
                "create contact",
            )
            .await?;
        Ok(parse_person(&data))
    }

    /// One page of the caller's connections. `nextPageToken` is returned,
    /// not followed.
    pub async fn list_connections(&self, access_token: Option<&str>) -> Result<ConnectionsPage> {
        let token = self.access_token(access_token).await?;
        let url = format!("{}/v1/people/me/connections", self.people_api);

        let data = self
            .send(
                self.http
                    .get(&url)
                    .query(&[("personFields", READ_PERSON_FIELDS)])
                    .bearer_auth(&token),
                "list connections",
            )
            .await?;

        let connections = data["connections"]
            .as_array()
            .map(|arr| arr.iter().map(parse_person).collect())
            .unwrap_or_default();

        Ok(ConnectionsPage {
            connections,
            next_page_token: data["nextPageToken"].as_str().map(|s| s.to_string()),
            total_items: data["totalItems"].as_u64(),
        })
    }

    /// Fetch a single contact, e.g. `people/c1234`.
    pub async fn get_contact(
        &self,
        resource_name: &str,
        access_token: Option<&str>,
    ) -> Result<Person> {
        let token = self.access_token(access_token).await?;
        let url = format!("{}/v1/{resource_name}", self.people_api);

        let data = self
            .send(
                self.http
                    .get(&url)
                    .query(&[("personFields", READ_PERSON_FIELDS)])
                    .bearer_auth(&token),
                "get contact",
            )
            .await?;
        Ok(parse_person(&data))
    }

    /// Replace a contact's photo. `photo_bytes` is base64 and forwarded as-is.
    pub async fn update_contact_photo(
        &self,
        resource_name: &str,
        photo_bytes: &str,
        access_token: Option<&str>,
    ) -> Result<Person> {
        let token = self.access_token(access_token).await?;
        let url = format!("{}/v1/{resource_name}:updateContactPhoto", self.people_api);

        let data = self
            .send(
                self.http
                    .patch(&url)
                    .bearer_auth(&token)
                    .json(&json!({ "photoBytes": photo_bytes })),
                "update contact photo",
            )
            .await?;

        match data.get("person") {
            Some(person) => Ok(parse_person(person)),
            None => Ok(parse_person(&data)),
        }
    }

    /// Find the first group whose name matches exactly, creating it when
    /// there is none.
    ///
    /// Two callers resolving the same new name at once can both create it;
    /// the provider then holds duplicate groups.
    pub async fn resolve_group(
        &self,
        name: &str,
        access_token: Option<&str>,
    ) -> Result<ContactGroup> {
        let token = self.access_token(access_token).await?;
        let url = format!("{}/v1/contactGroups", self.people_api);

        let data = self
            .send(self.http.get(&url).bearer_auth(&token), "list contact groups")
            .await?;

        let existing = data["contactGroups"]
            .as_array()
            .and_then(|groups| groups.iter().find(|g| g["name"].as_str() == Some(name)));

        match existing {
            Some(group) => parse_group(group),
            None => {
                tracing::info!(group = name, "contact group not found, creating it");
                self.create_group(name, Some(&token)).await
            }
        }
    }

    pub async fn create_group(
        &self,
        name: &str,
        access_token: Option<&str>,
    ) -> Result<ContactGroup> {
        if name.trim().is_empty() {
            return Err(WPeopleError::MissingArgument("name"));
        }
        let token = self.access_token(access_token).await?;
        let url = format!("{}/v1/contactGroups", self.people_api);

        let data = self
            .send(
                self.http
                    .post(&url)
                    .bearer_auth(&token)
                    .json(&json!({ "contactGroup": { "name": name } })),
                "create contact group",
            )
            .await?;
        parse_group(&data)
    }

    /// Token introspection. Only a 200 counts as success.
    pub async fn token_info(&self, access_token: Option<&str>) -> Result<TokenInfo> {
        let token = self.access_token(access_token).await?;
        let url = format!("{}/oauth2/v1/tokeninfo", self.oauth_api);

        let resp = self
            .http
            .get(&url)
            .query(&[("access_token", token.as_str())])
            .send()
            .await
            .map_err(|e| WPeopleError::Request(format!("token info request failed: {e}")))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| WPeopleError::Request(format!("token info read failed: {e}")))?;

        if status != 200 {
            return Err(WPeopleError::Http { status, body: text });
        }

        let data: Value = serde_json::from_str(&text)
            .map_err(|e| WPeopleError::Decode(format!("token info json parse failed: {e}")))?;
        if !data.is_object() {
            return Err(WPeopleError::Decode(
                "token info response is not an object".to_string(),
            ));
        }

        Ok(TokenInfo {
            email: data["email"].as_str().map(|s| s.to_string()),
            audience: data["audience"].as_str().map(|s| s.to_string()),
            scope: data["scope"].as_str().map(|s| s.to_string()),
            expires_in: data["expires_in"].as_i64(),
            raw: data,
        })
    }
}

/// Request body for `people:createContact`.
pub fn contact_body(contact: &NewContact, group_resource: &str) -> Value {
    let mut body = json!({
        "names": [{ "givenName": contact.name }],
        "phoneNumbers": [{ "value": contact.phone }],
        "emailAddresses": [{ "displayName": contact.name, "value": contact.email }],
        "memberships": [{
            "contactGroupMembership": { "contactGroupResourceName": group_resource }
        }],
    });

    if let Some(address) = &contact.address {
        body["addresses"] = json!([address_entry(address)]);
    }
    if let Some(birthday) = &contact.birthday {
        body["birthdays"] = json!([birthday_entry(birthday)]);
    }
    if let Some(urls) = &contact.urls {
        body["urls"] = entry_list(urls);
    }
    if let Some(events) = &contact.events {
        body["events"] = entry_list(events);
    }
    if let Some(user_defined) = &contact.user_defined {
        body["userDefined"] = entry_list(user_defined);
    }

    body
}

fn address_entry(address: &Address) -> Value {
    let city = address.city.as_deref().map(title_case);
    let country = address.country.as_deref().map(str::to_uppercase);
    let country_code = address.country_code.as_deref().map(str::to_uppercase);

    let formatted = format!(
        "{} {}",
        city.as_deref().unwrap_or_default(),
        country_code
            .as_deref()
            .or(country.as_deref())
            .unwrap_or_default()
    );

    let mut entry = json!({ "formattedValue": formatted.trim() });
    if let Some(city) = city {
        entry["city"] = json!(city);
    }
    if let Some(country) = country {
        entry["country"] = json!(country);
    }
    if let Some(code) = country_code {
        entry["countryCode"] = json!(code);
    }
    entry
}

fn birthday_entry(birthday: &Birthday) -> Value {
    json!({
        "date": {
            "year": birthday.year,
            "month": birthday.month,
            "day": birthday.day,
        }
    })
}

/// Arrays pass through, a single object becomes a one-element array, and
/// anything else becomes `[null]`. Existing integrations depend on the
/// `[null]` shape.
fn entry_list(value: &Value) -> Value {
    match value {
        Value::Array(_) => value.clone(),
        Value::Object(_) => json!([value]),
        _ => json!([null]),
    }
}

/// Upper-case the first letter of every whitespace-separated word.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for c in s.chars() {
        if word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        word_start = c.is_whitespace();
    }
    out
}

fn field_values(v: &Value, field: &str, key: &str) -> Vec<String> {
    v[field]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|item| item[key].as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_person(v: &Value) -> Person {
    let mut names = field_values(v, "names", "displayName");
    if names.is_empty() {
        names = field_values(v, "names", "givenName");
    }

    Person {
        resource_name: v["resourceName"].as_str().unwrap_or_default().to_string(),
        etag: v["etag"].as_str().map(|s| s.to_string()),
        names,
        phone_numbers: field_values(v, "phoneNumbers", "value"),
        email_addresses: field_values(v, "emailAddresses", "value"),
        photos: field_values(v, "photos", "url"),
        raw: v.clone(),
    }
}

fn parse_group(v: &Value) -> Result<ContactGroup> {
    let resource_name = v["resourceName"]
        .as_str()
        .ok_or_else(|| WPeopleError::Decode("contact group without resourceName".to_string()))?;

    Ok(ContactGroup {
        resource_name: resource_name.to_string(),
        name: v["name"].as_str().unwrap_or_default().to_string(),
        member_count: v["memberCount"].as_u64(),
    })
}
