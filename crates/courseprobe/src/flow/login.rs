//! Login page steps.

use super::StepContext;
use crate::config::Credentials;
use crate::evaluator::ElementCondition;
use crate::executor::Action;
use crate::locator::Locator;
use crate::observation::Observation;
use crate::result::ProbeResult;
use crate::session::Session;
use tracing::{debug, info};

/// Link that reveals the organization login
pub const MORE_LOGIN_OPTIONS: &str = "More Login Options";
/// Organization input id
pub const ORG_INPUT_ID: &str = "org";
/// Organization confirm button
pub const SELECT_ORG_SELECTOR: &str = "button.select-org";
/// Email input id
pub const EMAIL_INPUT_ID: &str = "email";
/// Password input id
pub const PASSWORD_INPUT_ID: &str = "password";
/// Login submit button
pub const LOGIN_SUBMIT_SELECTOR: &str = "button[type='submit']";
/// Navigation menu button id, visible once logged in
pub const MENU_BUTTON_ID: &str = "navigation-menu";

/// Load the landing page, log in, and wait for the navigation menu
pub fn log_in(
    ctx: &StepContext,
    session: &mut dyn Session,
    base_url: &str,
    credentials: &Credentials,
) -> ProbeResult<Observation> {
    session.navigate(base_url)?;
    let exec = &ctx.login;
    let poller = exec.poller();

    exec.perform(session, &Locator::link_text(MORE_LOGIN_OPTIONS), &Action::Click)?;

    let org = Locator::id(ORG_INPUT_ID);
    poller.wait_for_element(session, exec.spec(), &org, ElementCondition::Visible)?;
    exec.perform(session, &org, &Action::Replace(credentials.org.clone()))?;
    exec.perform(session, &Locator::new(SELECT_ORG_SELECTOR), &Action::Click)?;
    debug!(org = %credentials.org, "organization selected");

    let email = Locator::id(EMAIL_INPUT_ID);
    poller.wait_for_element(session, exec.spec(), &email, ElementCondition::Visible)?;
    exec.perform(session, &email, &Action::Type(credentials.email.clone()))?;
    exec.perform(
        session,
        &Locator::id(PASSWORD_INPUT_ID),
        &Action::Type(credentials.password.clone()),
    )?;
    exec.perform(session, &Locator::new(LOGIN_SUBMIT_SELECTOR), &Action::Click)?;

    confirm_landing(ctx, session)
}

/// Wait until the navigation menu is visible
pub fn confirm_landing(ctx: &StepContext, session: &mut dyn Session) -> ProbeResult<Observation> {
    let exec = &ctx.login;
    exec.poller().wait_for_element(
        session,
        exec.spec(),
        &Locator::id(MENU_BUTTON_ID),
        ElementCondition::Visible,
    )?;
    info!("landing page loaded");
    Ok(Observation::Flag(true))
}
