//! Actions available to page definitions run from the CLI.

use jpub_page::{ActionContext, ActionError, ActionRegistry};
use jpub_xml::Configuration;

/// Named `<param>` value of an action element.
fn param<'a>(config: &'a Configuration, name: &str) -> Option<&'a str> {
    config
        .children_named("param")
        .find(|p| p.attribute("name") == Some(name))
        .map(Configuration::value)
}

/// `redirect`: redirect to the `location` param.
fn redirect(context: &mut ActionContext, config: &Configuration) -> Result<(), ActionError> {
    let location = param(config, "location")
        .filter(|l| !l.is_empty())
        .ok_or_else(|| {
            ActionError::InvalidConfig("redirect requires a location param".to_owned())
        })?;
    context.set_redirect(location);
    Ok(())
}

/// `set-variable`: copy every `<param>` into the context.
fn set_variable(context: &mut ActionContext, config: &Configuration) -> Result<(), ActionError> {
    for p in config.children_named("param") {
        let name = p.attribute("name").ok_or_else(|| {
            ActionError::InvalidConfig("<param> requires a name attribute".to_owned())
        })?;
        context.insert(name, p.value());
    }
    Ok(())
}

/// Registry with the built-in actions.
pub(crate) fn builtin_actions() -> ActionRegistry {
    ActionRegistry::new()
        .with("redirect", redirect)
        .with("set-variable", set_variable)
}
