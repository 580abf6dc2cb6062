//! Main dashboard layout component

use leptos::prelude::*;
use mondash_state::use_app_state;

use crate::{ChartDefinition, ChartWidget, StatusBar};

#[component]
pub fn Dashboard(
    charts: Vec<ChartDefinition>,
    #[prop(into, optional)] title: Option<String>,
) -> impl IntoView {
    let state = use_app_state();
    let connection = state.connection;
    let title = title.unwrap_or_else(|| "Monitoring".to_string());
    let empty = charts.is_empty();

    view! {
        <div class="dashboard">
            <header class="dash-header">
                <span class="dash-title">{title}</span>
                <span
                    class=move || format!("connection-dot {}", connection.get().css_class())
                    title=move || connection.get().label()
                />
            </header>

            <main class="dash-main chart-grid">
                {charts
                    .into_iter()
                    .map(|definition| view! { <ChartWidget definition=definition /> })
                    .collect_view()}
                {empty.then(|| {
                    view! {
                        <div class="panel dash-empty">
                            "No series selected. Add "
                            <code>"?paths=host.cpu.load,host.mem.used"</code>
                            " to the address."
                        </div>
                    }
                })}
            </main>

            <footer class="dash-footer">
                <StatusBar />
            </footer>
        </div>
    }
}
