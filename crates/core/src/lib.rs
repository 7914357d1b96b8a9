pub mod badge;
pub mod bootstrap;
pub mod classifier;
pub mod error_presenter;
pub mod logging;
pub mod markup;
pub mod models;
pub mod query_controller;
pub mod sample_catalog;
pub mod settings;
pub mod table_renderer;

#[must_use]
pub fn domain_name() -> &'static str {
    "sqlab-core"
}

#[cfg(test)]
mod tests {
    use super::domain_name;

    #[test]
    fn domain_name_is_stable() {
        assert_eq!(domain_name(), "sqlab-core");
    }
}
