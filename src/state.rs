use crate::{
    config::RuntimeConfiguration,
    error::SiswaResult,
    proxy::StudentProxy,
    upstream::{HttpTransport, ReqwestTransport},
};
use maud::{DOCTYPE, Markup, html};
use std::{ops::Deref, sync::Arc};

#[derive(Clone, Debug)]
pub struct SiswaState {
    proxy: StudentProxy,
    config: RuntimeConfiguration,
}

impl SiswaState {
    pub fn new(config: RuntimeConfiguration) -> SiswaResult<Self> {
        let transport = ReqwestTransport::new(config.upstream_config())?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>, config: RuntimeConfiguration) -> Self {
        let base = config.upstream_config().base_url().clone();

        Self {
            proxy: StudentProxy::new(transport, base),
            config,
        }
    }

    pub const fn page_size(&self) -> usize {
        self.config.page_size()
    }

    #[allow(clippy::unused_self, clippy::needless_pass_by_value)] //in case self is ever needed :), and to allow direct html! usage
    pub fn render(&self, markup: Markup) -> Markup {
        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="UTF-8" {}
                    meta name="viewport" content="width=device-width, initial-scale=1.0" {}
                    script src="https://unpkg.com/htmx.org@2.0.4" integrity="sha384-HGfztofotfshcF7+8n44JQL2oJmowVChPTg48S+jvZoztPfvwD79OC/LTtG6dMp+" crossorigin="anonymous" {}
                    script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4" {}
                    title { "Student Management" }
                }
                body class="bg-gray-900 min-h-screen flex flex-col items-center p-6 text-white" {
                    div id="notifications" class="fixed top-4 right-4 z-10" {}
                    (markup)
                }
            }
        }
    }
}

impl Deref for SiswaState {
    type Target = StudentProxy;

    fn deref(&self) -> &Self::Target {
        &self.proxy
    }
}
