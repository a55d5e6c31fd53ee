use serde::Deserialize;

pub mod student;

/// `?id=` as sent by the UI, kept optional so a missing id can be answered with our own 400.
#[derive(Deserialize, Debug, Default)]
pub struct IdQuery {
    pub id: Option<String>,
}
