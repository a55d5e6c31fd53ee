use maud::{Markup, Render, html};

pub const INPUT_CLASSES: &str = "shadow appearance-none border rounded w-full py-2 px-3 leading-tight focus:outline-none focus:shadow-outline bg-gray-700 border-gray-600";

pub fn title(s: impl Render) -> Markup {
    html! {
        h1 class="text-2xl font-semibold mb-4" {(s)}
    }
}

pub fn form_element(id: &'static str, label: &'static str, element: Markup) -> Markup {
    html! {
        div class="mb-4" {
            label for=(id) class="block text-sm font-bold mb-2 text-gray-300" {(label)}
            (element)
        }
    }
}

pub fn simple_form_element(
    id: &'static str,
    label: &'static str,
    required: bool,
    value: Option<&str>,
) -> Markup {
    form_element(
        id,
        label,
        html! {
            input type="text" id=(id) name=(id) required[required] value=[value] class=(INPUT_CLASSES) {}
        },
    )
}

///`cancel` is an `hx-get` url whose (empty) response replaces `#in_focus`
pub fn form_submit_button(text: Option<&str>, cancel: Option<&str>) -> Markup {
    html! {
        div class="flex items-center justify-between" {
            button type="submit" class="bg-blue-500 hover:bg-blue-700 font-bold py-2 px-4 rounded focus:outline-none focus:shadow-outline" {
                (text.unwrap_or("Submit"))
            }
            @if let Some(cancel) = cancel {
                button type="button" hx-get=(cancel) hx-target="#in_focus" hx-swap="innerHTML" class="bg-gray-600 hover:bg-gray-700 font-bold py-2 px-4 rounded" {
                    "Cancel"
                }
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
}

/// Short-lived toast, swapped out-of-band into `#notifications` and cleared after a few seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Failure,
            message: message.into(),
        }
    }
}

impl Render for Notification {
    fn render(&self) -> Markup {
        let classes = match self.kind {
            NotificationKind::Success => "bg-green-100 border border-green-400 text-green-700 px-4 py-3 rounded",
            NotificationKind::Failure => "bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded",
        };

        html! {
            div id="notifications" hx-swap-oob="true" class="fixed top-4 right-4 z-10" {
                div class=(classes) role="alert" hx-get="/internal/notifications/clear" hx-trigger="load delay:3s" hx-target="#notifications" hx-swap="innerHTML" {
                    (self.message)
                }
            }
        }
    }
}
