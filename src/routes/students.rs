use crate::{
    data::{
        IdQuery,
        student::{ClassName, SaveStudentForm, Student, StudentId},
    },
    error::{SiswaResult, TowerSessionSnafu},
    maud_conveniences::{
        INPUT_CLASSES, Notification, form_element, form_submit_button, simple_form_element, title,
    },
    roster::{Created, NameOrder, Roster},
    state::SiswaState,
};
use axum::{
    Form,
    extract::{Query, State},
};
use maud::{Markup, html};
use serde::Deserialize;
use serde_json::json;
use snafu::ResultExt;
use tower_sessions::Session;

const ROSTER_KEY: &str = "roster";

const FETCH_FAILED: &str = "Failed to fetch students";
const SAVE_FAILED: &str = "Failed to save student";
const DELETE_FAILED: &str = "Failed to delete student";

const CLOSE_FORM: &str = "/internal/students/form/cancel";

const PAGE_SIZES: [usize; 4] = [8, 16, 32, 64];

const BUTTON_CLASSES: &str = "bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded";

async fn load_roster(session: &Session) -> SiswaResult<Option<Roster>> {
    session.get(ROSTER_KEY).await.context(TowerSessionSnafu)
}

async fn store_roster(session: &Session, roster: &Roster) -> SiswaResult<()> {
    session
        .insert(ROSTER_KEY, roster)
        .await
        .context(TowerSessionSnafu)
}

/// The session's roster, fetching it whenever no fetch has succeeded for this session yet.
async fn session_roster(
    state: &SiswaState,
    session: &Session,
) -> SiswaResult<(Roster, Option<Notification>)> {
    let mut roster = match load_roster(session).await? {
        Some(roster) if roster.is_loaded() => return Ok((roster, None)),
        Some(roster) => roster,
        None => Roster::new(state.page_size()),
    };

    let notification = match roster.refresh(state).await {
        Ok(()) => None,
        Err(e) => {
            error!(?e, "Unable to fill roster");
            Some(Notification::failure(FETCH_FAILED))
        }
    };
    store_roster(session, &roster).await?;

    Ok((roster, notification))
}

pub async fn get_students_page(
    State(state): State<SiswaState>,
    session: Session,
) -> SiswaResult<Markup> {
    let (roster, notification) = session_roster(&state, &session).await?;

    Ok(state.render(html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-5xl w-full flex flex-col space-y-4" {
            (title("Student List"))
            (render_controls(&roster, false))
            div id="student_table" {
                (render_table(&roster))
            }
            div id="in_focus" {}
        }
        @if let Some(notification) = notification {
            (notification)
        }
    }))
}

#[derive(Deserialize, Debug, Default)]
pub struct TableQuery {
    #[serde(default)]
    pub search: String,
    pub class_name: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub sort: Option<NameOrder>,
}

pub async fn internal_get_student_table(
    State(state): State<SiswaState>,
    session: Session,
    Query(TableQuery {
        search,
        class_name,
        page,
        page_size,
        sort,
    }): Query<TableQuery>,
) -> SiswaResult<Markup> {
    let (mut roster, notification) = session_roster(&state, &session).await?;

    if let Some(order) = sort.filter(|order| *order != roster.name_order()) {
        roster.set_name_order(order);
    }
    if roster.filters_differ(&search, class_name.as_deref()) {
        roster.set_filters(&search, class_name.as_deref());
    } else if let Some(size) = page_size.filter(|size| *size != roster.page().size) {
        roster.set_page_size(size);
    } else if let Some(page) = page {
        roster.set_page(page);
    }
    store_roster(&session, &roster).await?;

    Ok(html! {
        (render_table(&roster))
        @if let Some(notification) = notification {
            (notification)
        }
    })
}

pub async fn internal_post_refresh(
    State(state): State<SiswaState>,
    session: Session,
) -> SiswaResult<Markup> {
    let mut roster = load_roster(&session)
        .await?
        .unwrap_or_else(|| Roster::new(state.page_size()));

    let notification = match roster.refresh(&state).await {
        Ok(()) => {
            store_roster(&session, &roster).await?;
            None
        }
        Err(e) => {
            error!(?e, "Unable to refresh roster");
            Some(Notification::failure(FETCH_FAILED))
        }
    };

    Ok(html! {
        (render_table(&roster))
        @if let Some(notification) = notification {
            (notification)
        }
    })
}

///clears search and class filter, then fetches again
pub async fn internal_post_reset(
    State(state): State<SiswaState>,
    session: Session,
) -> SiswaResult<Markup> {
    let mut roster = load_roster(&session)
        .await?
        .unwrap_or_else(|| Roster::new(state.page_size()));
    roster.set_filters("", None);

    let notification = match roster.refresh(&state).await {
        Ok(()) => None,
        Err(e) => {
            error!(?e, "Unable to refresh roster after reset");
            Some(Notification::failure(FETCH_FAILED))
        }
    };
    store_roster(&session, &roster).await?;

    Ok(html! {
        (render_table(&roster))
        (render_controls(&roster, true))
        @if let Some(notification) = notification {
            (notification)
        }
    })
}

pub async fn internal_get_student_form(
    State(state): State<SiswaState>,
    session: Session,
    Query(IdQuery { id }): Query<IdQuery>,
) -> SiswaResult<Markup> {
    let Some(id) = id.filter(|id| !id.trim().is_empty()) else {
        return Ok(render_student_form(None));
    };

    let (roster, _) = session_roster(&state, &session).await?;
    Ok(match roster.find(&StudentId::from(id)) {
        Some(student) => render_student_form(Some(student)),
        None => html! {
            (render_student_form(None))
            (Notification::failure("Student not found"))
        },
    })
}

pub async fn internal_post_save_student(
    State(state): State<SiswaState>,
    session: Session,
    Form(form): Form<SaveStudentForm>,
) -> SiswaResult<Markup> {
    let (mut roster, _) = session_roster(&state, &session).await?;
    let (id, fields) = form.into_parts();

    let outcome = match &id {
        Some(id) => roster
            .update(&state, id, &fields)
            .await
            .map(|()| "Student updated successfully!"),
        None => roster
            .create(&state, &fields)
            .await
            .map(|created| match created {
                Created::Appended | Created::Refreshed => "Student added successfully!",
                Created::RefreshFailed => {
                    "Student added successfully, but failed to fetch students"
                }
            }),
    };

    Ok(match outcome {
        Ok(message) => {
            store_roster(&session, &roster).await?;
            html! {
                (render_table(&roster))
                div id="in_focus" hx-swap-oob="true" {}
                (Notification::success(message))
            }
        }
        Err(e) => {
            error!(?e, ?id, "Unable to save student");
            html! {
                (render_table(&roster))
                (Notification::failure(SAVE_FAILED))
            }
        }
    })
}

pub async fn internal_post_delete_student(
    State(state): State<SiswaState>,
    session: Session,
    Form(IdQuery { id }): Form<IdQuery>,
) -> SiswaResult<Markup> {
    let (mut roster, _) = session_roster(&state, &session).await?;

    let Some(id) = id
        .filter(|id| !id.trim().is_empty())
        .map(|id| StudentId::from(id.trim()))
    else {
        warn!("Delete requested without an id");
        return Ok(html! {
            (render_table(&roster))
            (Notification::failure(DELETE_FAILED))
        });
    };

    let notification = match roster.delete(&state, &id).await {
        Ok(()) => {
            store_roster(&session, &roster).await?;
            Notification::success("Student deleted successfully!")
        }
        Err(e) => {
            error!(?e, %id, "Unable to delete student");
            Notification::failure(DELETE_FAILED)
        }
    };

    Ok(html! {
        (render_table(&roster))
        (notification)
    })
}

pub async fn internal_get_clear_notifications() -> Markup {
    html! {}
}

pub async fn internal_get_close_form() -> Markup {
    html! {}
}

///`oob` swaps the controls in alongside a table response
fn render_controls(roster: &Roster, oob: bool) -> Markup {
    let mut sizes = PAGE_SIZES.to_vec();
    if !sizes.contains(&roster.page().size) {
        sizes.push(roster.page().size);
        sizes.sort_unstable();
    }

    html! {
        div id="student_controls" hx-swap-oob=[oob.then_some("true")] {
            form class="flex flex-row space-x-4 items-center" hx-get="/internal/students/table" hx-target="#student_table" hx-trigger="input changed delay:300ms from:#search, change from:#class_name_filter, change from:#page_size" {
                input type="search" id="search" name="search" placeholder="Search name or major" value=(roster.search()) class=(INPUT_CLASSES) {}
                select id="class_name_filter" name="class_name" class=(INPUT_CLASSES) {
                    option value="" selected[roster.class_filter().is_none()] {"All classes"}
                    @for class in ClassName::ALL {
                        option value=(class.as_str()) selected[roster.class_filter() == Some(class.as_str())] {(class.as_str())}
                    }
                }
                select id="page_size" name="page_size" class=(INPUT_CLASSES) {
                    @for size in sizes {
                        option value=(size) selected[roster.page().size == size] {(size) " / page"}
                    }
                }
                button type="button" hx-post="/internal/students/refresh" hx-target="#student_table" class=(BUTTON_CLASSES) {"Reload"}
                button type="button" hx-post="/internal/students/reset" hx-target="#student_table" class=(BUTTON_CLASSES) {"Reset"}
                button type="button" hx-get="/internal/students/form" hx-target="#in_focus" class="bg-blue-600 hover:bg-blue-800 font-bold py-2 px-4 rounded whitespace-nowrap" {"Add Student"}
            }
        }
    }
}

fn id_vals(id: &StudentId) -> String {
    json!({ "id": id.as_str() }).to_string()
}

fn page_vals(roster: &Roster, number: usize) -> String {
    json!({
        "search": roster.search(),
        "class_name": roster.class_filter().unwrap_or_default(),
        "page": number,
        "page_size": roster.page().size,
        "sort": roster.name_order().as_str(),
    })
    .to_string()
}

fn sort_vals(roster: &Roster) -> String {
    json!({
        "search": roster.search(),
        "class_name": roster.class_filter().unwrap_or_default(),
        "sort": roster.name_order().next().as_str(),
    })
    .to_string()
}

pub fn render_table(roster: &Roster) -> Markup {
    let first_row = roster.first_row_number();
    let current = roster.page().number;

    html! {
        div class="overflow-x-auto" {
            table class="min-w-full bg-gray-800 rounded shadow-md" {
                thead class="bg-gray-700" {
                    tr {
                        th class="py-2 px-4 text-left font-semibold text-gray-300" {"No"}
                        th class="py-2 px-4 text-left font-semibold text-gray-300" {
                            button hx-get="/internal/students/table" hx-vals=(sort_vals(roster)) hx-target="#student_table" class="font-semibold hover:text-white" {
                                "Name"
                                @match roster.name_order() {
                                    NameOrder::Unsorted => {},
                                    NameOrder::Ascending => {" ▲"},
                                    NameOrder::Descending => {" ▼"},
                                }
                            }
                        }
                        @for heading in ["NIS", "Class", "Major", "Actions"] {
                            th class="py-2 px-4 text-left font-semibold text-gray-300" {(heading)}
                        }
                    }
                }
                tbody {
                    @for (index, student) in roster.current_page().iter().enumerate() {
                        tr {
                            td class="py-2 px-4 border-b border-gray-600 text-gray-200 text-center" {(first_row + index)}
                            td class="py-2 px-4 border-b border-gray-600 text-gray-200" {(student.name)}
                            td class="py-2 px-4 border-b border-gray-600 text-gray-200 text-center" {(student.nis)}
                            td class="py-2 px-4 border-b border-gray-600 text-gray-200 text-center" {
                                @match ClassName::from_label(&student.class_name) {
                                    Some(class) => { (class) },
                                    None => { (student.class_name) },
                                }
                            }
                            td class="py-2 px-4 border-b border-gray-600 text-gray-200" {(student.major)}
                            td class="py-2 px-4 border-b border-gray-600 text-gray-200 space-x-2 whitespace-nowrap" {
                                button hx-get="/internal/students/form" hx-vals=(id_vals(&student.id)) hx-target="#in_focus" class="bg-gray-700 hover:bg-gray-600 text-sm py-1 px-3 rounded" {"Edit"}
                                button hx-post="/internal/students/delete" hx-vals=(id_vals(&student.id)) hx-confirm="Delete student?" hx-target="#student_table" class="bg-red-600 hover:bg-red-800 text-sm py-1 px-3 rounded" {"Delete"}
                            }
                        }
                    }
                    @if roster.visible().is_empty() {
                        tr {
                            td colspan="6" class="py-4 text-center italic text-gray-400" {"No students found"}
                        }
                    }
                }
            }
        }
        div class="flex flex-row justify-between items-center mt-4" {
            span class="text-sm text-gray-400" {(roster.visible().len()) " of " (roster.all().len()) " students"}
            div class="flex flex-row space-x-2" {
                @for number in 1..=roster.page_count() {
                    @if number == current {
                        span class="bg-blue-600 font-bold py-1 px-3 rounded" {(number)}
                    } @else {
                        button hx-get="/internal/students/table" hx-vals=(page_vals(roster, number)) hx-target="#student_table" class="bg-gray-700 hover:bg-gray-600 py-1 px-3 rounded" {(number)}
                    }
                }
            }
        }
    }
}

///`None` renders the empty "add" form
pub fn render_student_form(student: Option<&Student>) -> Markup {
    let selected_class = student.map(|student| student.class_name.as_str());

    html! {
        @if student.is_some() {
            (title("Edit Student"))
        } @else {
            (title("Add Student"))
        }

        form hx-post="/internal/students/save" hx-target="#student_table" class="p-4" {
            input type="hidden" name="id" value=(student.map(|s| s.id.as_str()).unwrap_or_default()) {}
            (simple_form_element("name", "Name", true, student.map(|s| s.name.as_str())))
            (simple_form_element("nis", "NIS", true, student.map(|s| s.nis.as_str())))
            (form_element("class_name", "Class", html! {
                select id="class_name" name="class_name" required class=(INPUT_CLASSES) {
                    @for class in ClassName::ALL {
                        option value=(class.as_str()) selected[selected_class == Some(class.as_str())] {(class.as_str())}
                    }
                }
            }))
            (simple_form_element("major", "Major", true, student.map(|s| s.major.as_str())))
            @if student.is_some() {
                (form_submit_button(Some("Update"), Some(CLOSE_FORM)))
            } @else {
                (form_submit_button(Some("Add"), Some(CLOSE_FORM)))
            }
        }
    }
}
