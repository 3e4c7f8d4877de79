//! From the landing page to the assignment window.

use super::login::MENU_BUTTON_ID;
use super::StepContext;
use crate::evaluator::ElementCondition;
use crate::executor::Action;
use crate::locator::Locator;
use crate::observation::Observation;
use crate::result::{ProbeError, ProbeResult};
use crate::session::Session;
use tracing::{info, warn};

/// Analytics entry of the navigation menu
pub const ANALYTICS_TAB_ID: &str = "navBar.commandView.analytics.title";
/// Workspace entry of the analytics sub-menu
pub const WORKSPACE_TAB_ID: &str = "navBar.commandView.analytics.subMenu.analyticsWorkspace";
/// Frame hosting the analytics workspace
pub const ANALYTICS_FRAME_SELECTOR: &str =
    "frame-router.main-iframe.visible iframe, iframe[title='Analytics UI']";
/// Link that opens the assignment window
pub const ASSIGNMENT_LINK_TEXT: &str = "Test Assignment";
/// Menu click attempts before giving up
pub const MENU_ATTEMPTS: u32 = 3;
/// Windows open once the assignment is launched
pub const EXPECTED_WINDOWS: usize = 2;

/// Open the navigation menu, retrying the click
pub fn open_menu(ctx: &StepContext, session: &mut dyn Session) -> ProbeResult<Observation> {
    session.switch_to_default_content()?;
    let menu = Locator::id(MENU_BUTTON_ID);
    let analytics = Locator::id(ANALYTICS_TAB_ID);
    for attempt in 1..=MENU_ATTEMPTS {
        ctx.step.perform(session, &menu, &Action::Click)?;
        match ctx
            .poller()
            .wait_for_element(session, ctx.spec(), &analytics, ElementCondition::Visible)
        {
            Ok(_) => {
                info!(attempt, "navigation menu open");
                return Ok(Observation::Count(attempt as usize));
            }
            Err(e) if e.is_timeout() => {
                warn!(attempt, max = MENU_ATTEMPTS, "navigation menu did not open");
            }
            Err(e) => return Err(e),
        }
    }
    Err(ProbeError::assertion("Failed to open the navigation menu."))
}

/// Enter the analytics workspace frame
pub fn enter_workspace(ctx: &StepContext, session: &mut dyn Session) -> ProbeResult<Observation> {
    ctx.step
        .perform(session, &Locator::id(ANALYTICS_TAB_ID), &Action::Click)?;
    ctx.step
        .perform(session, &Locator::id(WORKSPACE_TAB_ID), &Action::Click)?;
    ctx.poller()
        .wait_for_frame_and_switch(session, ctx.spec(), &Locator::new(ANALYTICS_FRAME_SELECTOR))?;
    Ok(Observation::Flag(true))
}

/// Launch the assignment and switch to the window it opens
pub fn open_assignment_window(
    ctx: &StepContext,
    session: &mut dyn Session,
) -> ProbeResult<Observation> {
    ctx.step.click_link_by_text(session, ASSIGNMENT_LINK_TEXT)?;
    ctx.step.switch_to_new_window(session, EXPECTED_WINDOWS)?;
    Ok(Observation::Count(EXPECTED_WINDOWS))
}
