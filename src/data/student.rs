use crate::error::{InvalidFormSnafu, SiswaResult};
use maud::{Markup, Render, html};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use snafu::ensure;
use std::fmt;

/// Upstream-assigned identifier. Upstream may send it as a number or a string, we only ever
/// compare it textually.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StudentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for StudentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StudentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(Self(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => text,
            RawId::Number(number) => number.to_string(),
        }))
    }
}

/// Turns whatever upstream put in a text column into text, `null` becoming empty.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub nis: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub class_name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub major: String,
    #[serde(
        default,
        deserialize_with = "lenient_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<String>,
    ///anything else upstream sent along, kept so nothing is lost on the way through
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Student {
    pub const DELETED_STATUS: &'static str = "deleted";

    pub fn is_deleted(&self) -> bool {
        self.status.as_deref() == Some(Self::DELETED_STATUS)
    }

    ///`lowercase_term` must already be lowercased
    pub fn matches_search(&self, lowercase_term: &str) -> bool {
        self.name.to_lowercase().contains(lowercase_term)
            || self.major.to_lowercase().contains(lowercase_term)
    }

    pub fn merge(&mut self, form: &StudentForm) {
        self.name.clone_from(&form.name);
        self.nis.clone_from(&form.nis);
        self.class_name = form.class_name.to_string();
        self.major.clone_from(&form.major);
    }
}

/// The class labels a student can be put in from the UI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassName {
    #[serde(rename = "X RPL 1")]
    XRpl1,
    #[serde(rename = "X RPL 2")]
    XRpl2,
    #[serde(rename = "XI RPL 1")]
    XiRpl1,
    #[serde(rename = "XI RPL 2")]
    XiRpl2,
    #[serde(rename = "XII RPL 1")]
    XiiRpl1,
    #[serde(rename = "XII RPL 2")]
    XiiRpl2,
}

impl ClassName {
    pub const ALL: [Self; 6] = [
        Self::XRpl1,
        Self::XRpl2,
        Self::XiRpl1,
        Self::XiRpl2,
        Self::XiiRpl1,
        Self::XiiRpl2,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::XRpl1 => "X RPL 1",
            Self::XRpl2 => "X RPL 2",
            Self::XiRpl1 => "XI RPL 1",
            Self::XiRpl2 => "XI RPL 2",
            Self::XiiRpl1 => "XII RPL 1",
            Self::XiiRpl2 => "XII RPL 2",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.as_str() == label)
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Render for ClassName {
    fn render(&self) -> Markup {
        html! {
            span class="bg-blue-900 text-blue-200 text-xs font-medium px-2 py-1 rounded" {(self.as_str())}
        }
    }
}

/// Values of the add/edit form, also the JSON body sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentForm {
    pub name: String,
    pub nis: String,
    pub class_name: ClassName,
    pub major: String,
}

impl StudentForm {
    pub fn validate(&self) -> SiswaResult<()> {
        ensure!(
            !self.name.trim().is_empty(),
            InvalidFormSnafu {
                reason: "name must not be empty"
            }
        );
        Ok(())
    }
}

/// What the save endpoint receives: the form plus a hidden `id` that is blank when adding.
#[derive(Debug, Deserialize)]
pub struct SaveStudentForm {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub nis: String,
    pub class_name: ClassName,
    #[serde(default)]
    pub major: String,
}

impl SaveStudentForm {
    pub fn into_parts(self) -> (Option<StudentId>, StudentForm) {
        let id = (!self.id.trim().is_empty()).then(|| StudentId::from(self.id.trim()));
        (
            id,
            StudentForm {
                name: self.name.trim().to_string(),
                nis: self.nis.trim().to_string(),
                class_name: self.class_name,
                major: self.major.trim().to_string(),
            },
        )
    }
}
