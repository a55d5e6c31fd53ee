//! The list/edit UI's working copy of the student collection.
//!
//! `all` is what the last successful refresh returned (minus soft-deleted records), `visible`
//! is always derived from it by the current search term and class filter. Every operation that
//! talks to the proxy only touches local state once the proxy has answered successfully.

use crate::{
    data::student::{Student, StudentForm, StudentId},
    error::{SerialiseFormSnafu, SiswaResult},
    proxy::StudentProxy,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::ResultExt;
use std::cmp::Reverse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    ///1-based
    pub number: usize,
    pub size: usize,
}

/// Ordering of the visible list by student name. Clicking the Name header cycles through these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameOrder {
    ///as upstream returned them
    #[default]
    Unsorted,
    Ascending,
    Descending,
}

impl NameOrder {
    pub const fn next(self) -> Self {
        match self {
            Self::Unsorted => Self::Ascending,
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Unsorted,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unsorted => "unsorted",
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }
}

/// How a successful create made it into the local list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Created {
    ///the record upstream handed back was used directly
    Appended,
    ///no record came back, so the whole list was fetched again
    Refreshed,
    ///the student exists upstream, but fetching the list afterwards failed
    RefreshFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    all: Vec<Student>,
    visible: Vec<Student>,
    search: String,
    class_filter: Option<String>,
    #[serde(default)]
    name_order: NameOrder,
    page: Page,
    ///false until a fetch has succeeded
    #[serde(default)]
    loaded: bool,
}

/// Parses list records, dropping (and logging) the ones that are not students.
pub fn students_from_records(records: Vec<Value>) -> Vec<Student> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<Student>(record) {
            Ok(student) => Some(student),
            Err(e) => {
                warn!(?e, "Skipping upstream record that is not a student");
                None
            }
        })
        .collect()
}

impl Roster {
    pub fn new(page_size: usize) -> Self {
        Self {
            all: Vec::new(),
            visible: Vec::new(),
            search: String::new(),
            class_filter: None,
            name_order: NameOrder::Unsorted,
            page: Page {
                number: 1,
                size: page_size.max(1),
            },
            loaded: false,
        }
    }

    pub fn all(&self) -> &[Student] {
        &self.all
    }

    pub fn visible(&self) -> &[Student] {
        &self.visible
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn class_filter(&self) -> Option<&str> {
        self.class_filter.as_deref()
    }

    pub const fn name_order(&self) -> NameOrder {
        self.name_order
    }

    pub const fn page(&self) -> Page {
        self.page
    }

    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn find(&self, id: &StudentId) -> Option<&Student> {
        self.all.iter().find(|student| &student.id == id)
    }

    /// Swaps in a freshly fetched collection, hiding soft-deleted records.
    pub fn replace_all(&mut self, students: Vec<Student>) {
        self.all = students
            .into_iter()
            .filter(|student| !student.is_deleted())
            .collect();
        self.loaded = true;
        self.derive();
    }

    pub async fn refresh(&mut self, proxy: &StudentProxy) -> SiswaResult<()> {
        let reply = proxy.list().await?;
        let records = match reply.data {
            Value::Array(records) => records,
            _ => Vec::new(),
        };

        self.replace_all(students_from_records(records));
        info!(count = self.all.len(), "Refreshed roster");
        Ok(())
    }

    ///changing filters always goes back to the first page
    pub fn set_filters(&mut self, search: &str, class_filter: Option<&str>) {
        self.search = search.trim().to_string();
        self.class_filter = class_filter
            .map(str::trim)
            .filter(|class| !class.is_empty())
            .map(ToString::to_string);
        self.derive();
    }

    pub fn filters_differ(&self, search: &str, class_filter: Option<&str>) -> bool {
        let class_filter = class_filter.map(str::trim).filter(|class| !class.is_empty());
        self.search != search.trim() || self.class_filter.as_deref() != class_filter
    }

    ///only reorders `visible`, `all` keeps upstream order
    pub fn set_name_order(&mut self, order: NameOrder) {
        self.name_order = order;
        self.derive();
    }

    fn derive(&mut self) {
        let term = self.search.to_lowercase();

        self.visible = self
            .all
            .iter()
            .filter(|student| term.is_empty() || student.matches_search(&term))
            .filter(|student| {
                self.class_filter
                    .as_deref()
                    .is_none_or(|class| student.class_name == class)
            })
            .cloned()
            .collect();

        match self.name_order {
            NameOrder::Unsorted => {}
            NameOrder::Ascending => self
                .visible
                .sort_by_cached_key(|student| student.name.to_lowercase()),
            NameOrder::Descending => self
                .visible
                .sort_by_cached_key(|student| Reverse(student.name.to_lowercase())),
        }
        self.page.number = 1;
    }

    /// Only an upstream rejection of the create itself is an error: once upstream has accepted
    /// the student, a failing follow-up refresh is reported as [`Created::RefreshFailed`].
    pub async fn create(
        &mut self,
        proxy: &StudentProxy,
        form: &StudentForm,
    ) -> SiswaResult<Created> {
        form.validate()?;
        let body = serde_json::to_value(form).context(SerialiseFormSnafu)?;
        let reply = proxy.create(body).await?;

        match serde_json::from_value::<Student>(reply.data) {
            Ok(created) => {
                if created.is_deleted() {
                    warn!(id = %created.id, "Upstream returned the new student as deleted");
                } else {
                    self.all.push(created);
                }
                self.derive();
                Ok(Created::Appended)
            }
            Err(e) => {
                debug!(?e, "Created record not returned, refreshing instead");
                match self.refresh(proxy).await {
                    Ok(()) => Ok(Created::Refreshed),
                    Err(e) => {
                        warn!(?e, "Student created but the roster could not be refreshed");
                        Ok(Created::RefreshFailed)
                    }
                }
            }
        }
    }

    pub async fn update(
        &mut self,
        proxy: &StudentProxy,
        id: &StudentId,
        form: &StudentForm,
    ) -> SiswaResult<()> {
        form.validate()?;
        let body = serde_json::to_value(form).context(SerialiseFormSnafu)?;
        proxy.update(id.as_str(), body).await?;

        if let Some(student) = self.all.iter_mut().find(|student| &student.id == id) {
            student.merge(form);
        }
        self.derive();
        Ok(())
    }

    pub async fn delete(&mut self, proxy: &StudentProxy, id: &StudentId) -> SiswaResult<()> {
        proxy.delete(id.as_str()).await?;
        self.remove(id);
        Ok(())
    }

    ///drops exactly the records with this id from both lists
    pub fn remove(&mut self, id: &StudentId) {
        self.all.retain(|student| &student.id != id);
        self.visible.retain(|student| &student.id != id);
        self.page.number = self.page.number.min(self.page_count());
    }

    pub fn page_count(&self) -> usize {
        self.visible.len().div_ceil(self.page.size).max(1)
    }

    pub fn set_page(&mut self, number: usize) {
        self.page.number = number.clamp(1, self.page_count());
    }

    ///a size of zero is ignored
    pub fn set_page_size(&mut self, size: usize) {
        if size == 0 {
            return;
        }
        self.page.size = size;
        self.page.number = 1;
    }

    pub fn current_page(&self) -> &[Student] {
        let start = (self.page.number - 1) * self.page.size;
        let end = (start + self.page.size).min(self.visible.len());
        self.visible.get(start..end).unwrap_or_default()
    }

    ///the number shown in the "No" column for the first row of the current page
    pub const fn first_row_number(&self) -> usize {
        (self.page.number - 1) * self.page.size + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::student::ClassName, upstream::testing::ScriptedTransport};
    use axum::http::Method;
    use reqwest::Url;
    use serde_json::json;
    use std::sync::Arc;

    const BASE: &str = "https://upstream.test/students";

    fn student(value: Value) -> Student {
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> Vec<Student> {
        vec![
            student(json!({"id": 1, "name": "Ana", "major": "RPL", "class_name": "X RPL 1"})),
            student(json!({"id": 2, "name": "Budi", "major": "TKJ", "class_name": "XI RPL 1", "status": "deleted"})),
            student(json!({"id": 3, "name": "Citra", "major": "Animasi", "class_name": "X RPL 1"})),
            student(json!({"id": 4, "name": "Dani", "major": "RPL", "class_name": "XI RPL 2"})),
        ]
    }

    fn proxy(transport: ScriptedTransport) -> (Arc<ScriptedTransport>, StudentProxy) {
        let transport = Arc::new(transport);
        let proxy = StudentProxy::new(transport.clone(), Url::parse(BASE).unwrap());
        (transport, proxy)
    }

    fn ids(students: &[Student]) -> Vec<&str> {
        students.iter().map(|student| student.id.as_str()).collect()
    }

    fn form(name: &str) -> StudentForm {
        StudentForm {
            name: name.into(),
            nis: "100".into(),
            class_name: ClassName::XiiRpl1,
            major: "RPL".into(),
        }
    }

    #[tokio::test]
    async fn refresh_hides_soft_deleted_records() {
        let (_, proxy) = proxy(ScriptedTransport::new().respond(
            Method::GET,
            BASE,
            200,
            r#"[{"id":1,"name":"Ana","major":"RPL","class_name":"X RPL 1"},{"id":2,"name":"Budi","major":"TKJ","class_name":"XI RPL 1","status":"deleted"}]"#,
        ));
        let mut roster = Roster::new(8);

        roster.refresh(&proxy).await.unwrap();

        assert_eq!(ids(roster.all()), ["1"]);
        assert_eq!(ids(roster.visible()), ["1"]);
    }

    #[tokio::test]
    async fn refresh_skips_records_that_are_not_students() {
        let (_, proxy) = proxy(ScriptedTransport::new().respond(
            Method::GET,
            BASE,
            200,
            r#"{"data":[{"id":1,"name":"Ana"},{"name":"no id"},42]}"#,
        ));
        let mut roster = Roster::new(8);

        roster.refresh(&proxy).await.unwrap();

        assert_eq!(ids(roster.all()), ["1"]);
    }

    #[tokio::test]
    async fn only_a_successful_fetch_marks_the_roster_loaded() {
        let (_, down) = proxy(ScriptedTransport::new().respond(Method::GET, BASE, 503, "unavailable"));
        let (_, up) = proxy(ScriptedTransport::new().respond(Method::GET, BASE, 200, "[]"));
        let mut roster = Roster::new(8);

        assert!(roster.refresh(&down).await.is_err());
        assert!(!roster.is_loaded());

        roster.refresh(&up).await.unwrap();
        assert!(roster.is_loaded());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_previous_list() {
        let (_, proxy) = proxy(ScriptedTransport::new().respond(Method::GET, BASE, 502, "bad gateway"));
        let mut roster = Roster::new(8);
        roster.replace_all(sample());
        roster.set_filters("a", None);
        let before = roster.clone();

        assert!(roster.refresh(&proxy).await.is_err());
        assert_eq!(roster, before);
    }

    #[test]
    fn search_is_a_case_insensitive_substring_of_name_or_major() {
        let mut roster = Roster::new(8);
        roster.replace_all(sample());

        roster.set_filters("  AN ", None);
        assert_eq!(ids(roster.visible()), ["1", "3", "4"]);
        for student in roster.visible() {
            assert!(
                student.name.to_lowercase().contains("an")
                    || student.major.to_lowercase().contains("an")
            );
        }

        roster.set_filters("rpl", None);
        assert_eq!(ids(roster.visible()), ["1", "4"]);
    }

    #[test]
    fn search_scenario_matches_ana_not_budi() {
        let mut roster = Roster::new(8);
        roster.all = sample().into_iter().take(2).collect();

        roster.set_filters("an", None);

        assert_eq!(ids(roster.visible()), ["1"]);
    }

    #[test]
    fn class_filter_is_exact_and_intersects_search() {
        let mut roster = Roster::new(8);
        roster.replace_all(sample());

        roster.set_filters("", Some("X RPL 1"));
        assert_eq!(ids(roster.visible()), ["1", "3"]);
        assert!(roster.visible().iter().all(|s| s.class_name == "X RPL 1"));

        roster.set_filters("cit", Some("X RPL 1"));
        assert_eq!(ids(roster.visible()), ["3"]);

        roster.set_filters("", Some("X RPL"));
        assert!(roster.visible().is_empty());

        roster.set_filters("", Some(""));
        assert_eq!(roster.class_filter(), None);
        assert_eq!(roster.visible().len(), 3);
    }

    #[test]
    fn filters_never_touch_the_fetched_list() {
        let mut roster = Roster::new(8);
        roster.replace_all(sample());
        let all = roster.all().to_vec();

        roster.set_filters("zzz", Some("XII RPL 2"));

        assert!(roster.visible().is_empty());
        assert_eq!(roster.all(), all.as_slice());
    }

    #[test]
    fn pagination_slices_the_visible_list() {
        let mut roster = Roster::new(2);
        roster.replace_all(sample());

        assert_eq!(roster.page_count(), 2);
        assert_eq!(ids(roster.current_page()), ["1", "3"]);
        assert_eq!(roster.first_row_number(), 1);

        roster.set_page(2);
        assert_eq!(ids(roster.current_page()), ["4"]);
        assert_eq!(roster.first_row_number(), 3);

        roster.set_page(99);
        assert_eq!(roster.page().number, 2);
        roster.set_page(0);
        assert_eq!(roster.page().number, 1);
    }

    #[test]
    fn filtering_resets_to_the_first_page() {
        let mut roster = Roster::new(1);
        roster.replace_all(sample());
        roster.set_page(3);

        roster.set_filters("rpl", None);

        assert_eq!(roster.page().number, 1);
    }

    #[test]
    fn page_size_changes_reset_and_zero_is_ignored() {
        let mut roster = Roster::new(1);
        roster.replace_all(sample());
        roster.set_page(2);

        roster.set_page_size(0);
        assert_eq!(roster.page(), Page { number: 2, size: 1 });

        roster.set_page_size(10);
        assert_eq!(roster.page(), Page { number: 1, size: 10 });
        assert_eq!(roster.page_count(), 1);
    }

    #[test]
    fn empty_roster_still_has_one_page() {
        let roster = Roster::new(8);

        assert_eq!(roster.page_count(), 1);
        assert!(roster.current_page().is_empty());
    }

    #[test]
    fn filter_change_detection_ignores_whitespace() {
        let mut roster = Roster::new(8);
        roster.set_filters("ana", Some("X RPL 1"));

        assert!(!roster.filters_differ(" ana ", Some("X RPL 1")));
        assert!(roster.filters_differ("ana", None));
        assert!(roster.filters_differ("budi", Some("X RPL 1")));
    }

    #[tokio::test]
    async fn delete_removes_exactly_that_id() {
        let (_, proxy) = proxy(ScriptedTransport::new().respond(
            Method::DELETE,
            "https://upstream.test/students/3",
            200,
            r#"{"success":true}"#,
        ));
        let mut roster = Roster::new(8);
        roster.replace_all(sample());
        roster.set_filters("", Some("X RPL 1"));

        roster.delete(&proxy, &StudentId::from("3")).await.unwrap();

        assert_eq!(ids(roster.all()), ["1", "4"]);
        assert_eq!(ids(roster.visible()), ["1"]);
    }

    #[tokio::test]
    async fn failed_delete_changes_nothing() {
        let (transport, proxy) = proxy(ScriptedTransport::new());
        let mut roster = Roster::new(8);
        roster.replace_all(sample());
        let before = roster.clone();

        assert!(roster.delete(&proxy, &StudentId::from("3")).await.is_err());
        assert_eq!(roster, before);
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn create_appends_the_returned_record() {
        let (transport, proxy) = proxy(ScriptedTransport::new().respond(
            Method::POST,
            BASE,
            201,
            r#"{"id":10,"name":"Eka","nis":"100","class_name":"XII RPL 1","major":"RPL"}"#,
        ));
        let mut roster = Roster::new(8);
        roster.replace_all(sample());

        assert_eq!(
            roster.create(&proxy, &form("Eka")).await.unwrap(),
            Created::Appended
        );

        assert_eq!(ids(roster.all()), ["1", "3", "4", "10"]);
        assert_eq!(
            transport.calls()[0].body,
            Some(json!({"name": "Eka", "nis": "100", "class_name": "XII RPL 1", "major": "RPL"}))
        );
    }

    #[tokio::test]
    async fn create_without_a_returned_record_refreshes() {
        let (transport, proxy) = proxy(
            ScriptedTransport::new()
                .respond(Method::POST, BASE, 200, r#"{"message":"ok"}"#)
                .respond(Method::GET, BASE, 200, r#"[{"id":10,"name":"Eka"}]"#),
        );
        let mut roster = Roster::new(8);
        roster.replace_all(sample());

        assert_eq!(
            roster.create(&proxy, &form("Eka")).await.unwrap(),
            Created::Refreshed
        );

        assert_eq!(ids(roster.all()), ["10"]);
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn create_still_succeeds_when_the_follow_up_refresh_fails() {
        let (transport, proxy) = proxy(
            ScriptedTransport::new()
                .respond(Method::POST, BASE, 201, r#"{"message":"created"}"#)
                .respond(Method::GET, BASE, 503, "unavailable"),
        );
        let mut roster = Roster::new(8);
        roster.replace_all(sample());
        let before = roster.clone();

        let outcome = roster.create(&proxy, &form("Eka")).await.unwrap();

        assert_eq!(outcome, Created::RefreshFailed);
        assert_eq!(roster, before);
        let methods: Vec<_> = transport.calls().iter().map(|call| call.method.clone()).collect();
        assert_eq!(methods, [Method::POST, Method::GET]);
    }

    #[tokio::test]
    async fn created_record_that_is_already_deleted_stays_hidden() {
        let (_, proxy) = proxy(ScriptedTransport::new().respond(
            Method::POST,
            BASE,
            201,
            r#"{"id":9,"name":"Eka","status":"deleted"}"#,
        ));
        let mut roster = Roster::new(8);
        roster.replace_all(sample());

        roster.create(&proxy, &form("Eka")).await.unwrap();

        assert!(roster.find(&StudentId::from("9")).is_none());
        assert!(roster.visible().iter().all(|student| !student.is_deleted()));
        assert_eq!(ids(roster.visible()), ["1", "3", "4"]);
    }

    #[test]
    fn name_order_cycles_and_only_touches_visible() {
        let mut roster = Roster::new(8);
        roster.replace_all(vec![
            student(json!({"id": 1, "name": "citra"})),
            student(json!({"id": 2, "name": "Ana"})),
            student(json!({"id": 3, "name": "budi"})),
        ]);

        let order = roster.name_order().next();
        roster.set_name_order(order);
        assert_eq!(roster.name_order(), NameOrder::Ascending);
        assert_eq!(ids(roster.visible()), ["2", "3", "1"]);

        roster.set_name_order(roster.name_order().next());
        assert_eq!(ids(roster.visible()), ["1", "3", "2"]);

        roster.set_name_order(roster.name_order().next());
        assert_eq!(roster.name_order(), NameOrder::Unsorted);
        assert_eq!(ids(roster.visible()), ["1", "2", "3"]);
        assert_eq!(ids(roster.all()), ["1", "2", "3"]);
    }

    #[test]
    fn name_order_survives_filtering() {
        let mut roster = Roster::new(8);
        roster.replace_all(sample());
        roster.set_name_order(NameOrder::Descending);

        roster.set_filters("", Some("X RPL 1"));

        assert_eq!(ids(roster.visible()), ["3", "1"]);
    }

    #[tokio::test]
    async fn invalid_forms_are_not_sent() {
        let (transport, proxy) = proxy(ScriptedTransport::new());
        let mut roster = Roster::new(8);

        assert!(roster.create(&proxy, &form(" ")).await.is_err());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn update_merges_in_place() {
        let (_, proxy) = proxy(ScriptedTransport::new().respond(
            Method::PUT,
            "https://upstream.test/students?id=4",
            200,
            r#"{"id":4}"#,
        ));
        let mut roster = Roster::new(8);
        roster.replace_all(sample());

        roster
            .update(&proxy, &StudentId::from("4"), &form("Dani Saputra"))
            .await
            .unwrap();

        assert_eq!(ids(roster.all()), ["1", "3", "4"]);
        let updated = roster.find(&StudentId::from("4")).unwrap();
        assert_eq!(updated.name, "Dani Saputra");
        assert_eq!(updated.class_name, "XII RPL 1");
    }

    #[tokio::test]
    async fn failed_update_changes_nothing() {
        let (_, proxy) = proxy(ScriptedTransport::new());
        let mut roster = Roster::new(8);
        roster.replace_all(sample());
        let before = roster.clone();

        assert!(
            roster
                .update(&proxy, &StudentId::from("4"), &form("Dani"))
                .await
                .is_err()
        );
        assert_eq!(roster, before);
    }
}
