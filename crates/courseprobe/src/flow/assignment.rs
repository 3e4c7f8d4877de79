//! Assignment window steps, from "Start Module" to the results page.

use super::{checkpoint_for, FlowState, StepContext};
use crate::evaluator::{self, ElementCondition, PercentSource};
use crate::executor::{Action, RadioOutcome};
use crate::locator::Locator;
use crate::observation::Observation;
use crate::probe::{Probe, PROGRESS_BAR_TAG};
use crate::result::{ProbeError, ProbeResult};
use crate::session::Session;
use tracing::{debug, info};

/// Shadow-scope button that starts the module
pub const START_BUTTON_TEXT: &str = "Start Module";
/// Shadow-scope button that advances a page
pub const NEXT_BUTTON_TEXT: &str = "Next";
/// Text fragment of the progress label
pub const PROGRESS_LABEL_TEXT: &str = "% complete";
/// Assessment frame id
pub const ASSESSMENT_FRAME_ID: &str = "assessment-builder";
/// First radio answer
pub const FIRST_ANSWER: &str = "7";
/// Free-text question label
pub const TEXT_QUESTION_LABEL: &str = "What is WHO?";
/// Free-text answer
pub const TEXT_ANSWER: &str = "World Health Organization";
/// Second radio answer
pub const SECOND_ANSWER: &str = "Yes";
/// Sidebar entry of the second group
pub const GROUP_TWO_TEXT: &str = "2. Group 2";
/// Element shown once the second group loads
pub const DOCUMENT_VIEWER_TAG: &str = "wem-document-viewer-legacy";
/// Final radio answer
pub const FINAL_ANSWER: &str = "East";
/// Progress bar attribute holding the fill percentage
pub const FILL_PERCENT_ATTR: &str = "fill-percent";
/// Host of the completion button
pub const COMPLETE_BUTTON_HOST: &str = "gux-button.complete-assignment";
/// Text of the submit button
pub const SUBMIT_TEXT: &str = "Submit";
/// Results page heading fragment
pub const RESULTS_HEADING_TEXT: &str = "Congratulations";
/// Score shown on the results page
pub const RESULTS_SCORE_TOKEN: &str = "100%";

/// Progress label locator
#[must_use]
pub fn progress_label() -> Locator {
    Locator::text_contains(PROGRESS_LABEL_TEXT)
}

fn label_source() -> PercentSource {
    PercentSource::Label {
        locator: progress_label(),
    }
}

fn enter_assessment_frame(ctx: &StepContext, session: &mut dyn Session) -> ProbeResult<()> {
    ctx.poller()
        .wait_for_frame_and_switch(session, ctx.spec(), &Locator::id(ASSESSMENT_FRAME_ID))
}

/// Wait for the label percentage to reach the checkpoint of `state`
fn wait_for_label_checkpoint(
    ctx: &StepContext,
    session: &mut dyn Session,
    state: FlowState,
) -> ProbeResult<Observation> {
    let checkpoint = checkpoint_for(state)?;
    let percent = ctx.poller().wait_for_percent_at_least(
        session,
        ctx.spec(),
        &label_source(),
        i32::from(checkpoint.value),
    )?;
    Ok(Observation::Percent(percent))
}

/// Wait for the checkpoint token of `state` in the progress text
fn wait_for_token_checkpoint(
    ctx: &StepContext,
    session: &mut dyn Session,
    state: FlowState,
) -> ProbeResult<Observation> {
    let token = checkpoint_for(state)?.token();
    ctx.poller().wait_for_text(session, ctx.spec(), &token)?;
    debug!(%token, "progress token observed");
    Ok(Observation::Text(token))
}

/// Start the module and assert the initial progress is exactly 0%
pub fn start_module(ctx: &StepContext, session: &mut dyn Session) -> ProbeResult<Observation> {
    let outcome = ctx.step.click_in_shadow_scope(session, &[START_BUTTON_TEXT]);
    debug!(?outcome, "start button");
    ctx.poller().wait_for_element(
        session,
        ctx.spec(),
        &progress_label(),
        ElementCondition::Visible,
    )?;
    ctx.poller()
        .wait_for_percent_at_least(session, ctx.spec(), &label_source(), 0)?;

    let checkpoint = checkpoint_for(FlowState::ModuleStarted)?;
    let percent = evaluator::progress_percentage(session, &progress_label());
    if !checkpoint.accepts(percent) {
        return Err(ProbeError::assertion(format!(
            "Initial progress should be 0%, found {percent}%"
        )));
    }
    info!(percent, "module started");
    Ok(Observation::Percent(percent))
}

/// Scroll every region to the bottom and wait for 33%
pub fn scroll_lesson(ctx: &StepContext, session: &mut dyn Session) -> ProbeResult<Observation> {
    let report = ctx.step.scroll_to_bottom_and_settle(session)?;
    debug!(regions = report.regions, moved = report.moved, "lesson scrolled");
    wait_for_label_checkpoint(ctx, session, FlowState::Scrolled)
}

/// Click "Next" and wait for progress above 33%
pub fn advance(ctx: &StepContext, session: &mut dyn Session) -> ProbeResult<Observation> {
    let outcome = ctx.step.click_in_shadow_scope(session, &[NEXT_BUTTON_TEXT]);
    debug!(?outcome, "next button");
    wait_for_label_checkpoint(ctx, session, FlowState::Advanced)
}

/// Open the assessment and answer the first radio question
pub fn answer_first_question(
    ctx: &StepContext,
    session: &mut dyn Session,
) -> ProbeResult<Observation> {
    let outcome = ctx.step.click_in_shadow_scope(session, &[NEXT_BUTTON_TEXT]);
    debug!(?outcome, "next button");
    enter_assessment_frame(ctx, session)?;
    ctx.step.select_radio_by_label(session, FIRST_ANSWER)?;
    session.switch_to_default_content()?;
    wait_for_token_checkpoint(ctx, session, FlowState::QuestionAnswered)
}

/// Fill the free-text answer and check the page percentage
pub fn enter_text_answer(ctx: &StepContext, session: &mut dyn Session) -> ProbeResult<Observation> {
    enter_assessment_frame(ctx, session)?;
    ctx.step
        .fill_textarea_by_label(session, TEXT_QUESTION_LABEL, TEXT_ANSWER)?;
    session.switch_to_default_content()?;
    wait_for_token_checkpoint(ctx, session, FlowState::TextEntered)?;

    let checkpoint = checkpoint_for(FlowState::TextEntered)?;
    let percent = evaluator::page_progress_percent(session);
    if percent < i32::from(checkpoint.value) {
        return Err(ProbeError::assertion(format!(
            "Progress should be at least {}% after text entry, found {percent}%",
            checkpoint.value
        )));
    }
    Ok(Observation::Percent(percent))
}

/// Answer the second radio question
pub fn answer_final_question(
    ctx: &StepContext,
    session: &mut dyn Session,
) -> ProbeResult<Observation> {
    enter_assessment_frame(ctx, session)?;
    ctx.step.select_radio_by_label(session, SECOND_ANSWER)?;
    session.switch_to_default_content()?;
    wait_for_token_checkpoint(ctx, session, FlowState::FinalQuestionAnswered)
}

/// Open the second group from the sidebar
pub fn open_group_two(ctx: &StepContext, session: &mut dyn Session) -> ProbeResult<Observation> {
    let group = Locator::tag("button").with_text(GROUP_TWO_TEXT)?;
    ctx.step.perform(session, &group, &Action::Click)?;
    ctx.poller().wait_for_element(
        session,
        ctx.spec(),
        &Locator::tag(DOCUMENT_VIEWER_TAG),
        ElementCondition::Present,
    )?;
    Ok(Observation::Flag(true))
}

/// Select the final answer and assert the bar reports 100%
pub fn select_final_answer(
    ctx: &StepContext,
    session: &mut dyn Session,
) -> ProbeResult<Observation> {
    enter_assessment_frame(ctx, session)?;
    let description = format!("radio {FINAL_ANSWER:?} to be present");
    ctx.poller().wait_until(
        ctx.spec(),
        &description,
        || ctx.step.select_radio_by_label(session, FINAL_ANSWER),
        |outcome| *outcome != RadioOutcome::NotFound,
    )?;
    ctx.step.confirm_radio_selected(session, FINAL_ANSWER)?;
    session.switch_to_default_content()?;

    let checkpoint = checkpoint_for(FlowState::FinalAnswerSelected)?;
    let expected = checkpoint.value.to_string();
    let full_bar = Locator::new(format!(
        "{PROGRESS_BAR_TAG}[{FILL_PERCENT_ATTR}='{expected}']"
    ));
    ctx.poller()
        .wait_for_element(session, ctx.spec(), &full_bar, ElementCondition::Present)?;
    let fill = evaluator::attribute(session, &full_bar, FILL_PERCENT_ATTR)?;
    if fill.as_deref() != Some(expected.as_str()) {
        return Err(ProbeError::assertion(format!(
            "Progress bar did not reach {expected}%, fill-percent is {fill:?}"
        )));
    }
    Ok(Observation::Percent(i32::from(checkpoint.value)))
}

/// Click the completion button inside its shadow root
pub fn complete_assignment(
    ctx: &StepContext,
    session: &mut dyn Session,
) -> ProbeResult<Observation> {
    session.switch_to_default_content()?;
    ctx.step
        .click_shadow_inner(session, COMPLETE_BUTTON_HOST, "button")?;
    Ok(Observation::Flag(true))
}

/// Click the submit button once it appears
pub fn submit_answers(ctx: &StepContext, session: &mut dyn Session) -> ProbeResult<Observation> {
    ctx.step.click_button_by_exact_text(session, SUBMIT_TEXT)?;
    Ok(Observation::Flag(true))
}

/// Wait for the results heading and the final score
pub fn confirm_results(ctx: &StepContext, session: &mut dyn Session) -> ProbeResult<Observation> {
    session.switch_to_default_content()?;
    ctx.poller().wait_for_element(
        session,
        ctx.spec(),
        &Locator::text_contains(RESULTS_HEADING_TEXT),
        ElementCondition::Visible,
    )?;
    ctx.poller().wait_for_flag(
        session,
        ctx.spec(),
        &Probe::AnyTextContains {
            token: RESULTS_SCORE_TOKEN.to_string(),
        },
    )?;
    info!("results page shows the final score");
    Ok(Observation::Text(RESULTS_SCORE_TOKEN.to_string()))
}
