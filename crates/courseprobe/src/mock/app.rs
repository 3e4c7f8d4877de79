//! Scripted assignment site for exercising the full flow without a browser.
//!
//! Window 0 is the login page with the analytics workspace; window 1 is the
//! assignment player, opened by the workspace link after a delay. Progress
//! display updates are queued and become visible `update_delay` after the
//! milestone that triggers them, so every confirmation has to poll.

use super::dom::{Document, NodeId, NodeSpec, Overflow, ScrollBox};
use super::session::{MockBehavior, MockSession, NodeAddr, World};
use crate::clock::SharedClock;
use crate::config::Credentials;
use crate::flow::assignment::{
    ASSESSMENT_FRAME_ID, COMPLETE_BUTTON_HOST, DOCUMENT_VIEWER_TAG, FILL_PERCENT_ATTR,
    FINAL_ANSWER, FIRST_ANSWER, GROUP_TWO_TEXT, NEXT_BUTTON_TEXT, RESULTS_HEADING_TEXT,
    SECOND_ANSWER, START_BUTTON_TEXT, SUBMIT_TEXT, TEXT_QUESTION_LABEL,
};
use crate::flow::login::{
    EMAIL_INPUT_ID, MENU_BUTTON_ID, MORE_LOGIN_OPTIONS, ORG_INPUT_ID, PASSWORD_INPUT_ID,
};
use crate::flow::navigation::{ASSIGNMENT_LINK_TEXT, ANALYTICS_TAB_ID, WORKSPACE_TAB_ID};
use crate::probe::PROGRESS_BAR_TAG;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, trace};

const LOGIN_URL: &str = "about:blank";
const PLAYER_URL: &str = "https://player.test/assignment";

/// Progress milestones of the assignment, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Milestone {
    /// Module started
    Started,
    /// Lesson scrolled to the bottom
    Scrolled,
    /// Moved past the lesson
    Advanced,
    /// First question answered
    Answered,
    /// Free-text answer committed
    TextEntered,
    /// Second question answered
    FinalAnswered,
    /// Final answer selected
    Completed,
}

impl Milestone {
    /// Every milestone in order
    pub const ALL: [Self; 7] = [
        Self::Started,
        Self::Scrolled,
        Self::Advanced,
        Self::Answered,
        Self::TextEntered,
        Self::FinalAnswered,
        Self::Completed,
    ];

    /// Percentage shown once the milestone is reached
    #[must_use]
    pub const fn default_percent(&self) -> u8 {
        match self {
            Self::Started => 0,
            Self::Scrolled => 33,
            Self::Advanced => 34,
            Self::Answered => 75,
            Self::TextEntered => 83,
            Self::FinalAnswered => 91,
            Self::Completed => 100,
        }
    }
}

/// How the scripted site behaves
#[derive(Debug, Clone)]
pub struct AppOptions {
    credentials: Credentials,
    percents: BTreeMap<Milestone, u8>,
    skipped: BTreeSet<Milestone>,
    update_delay: Duration,
    window_open_delay: Duration,
    menu_failures: u32,
    start_button_depth: usize,
    intercept_clicks: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            credentials: Credentials::new("learner@example.com", "secret", "acme"),
            percents: Milestone::ALL
                .iter()
                .map(|m| (*m, m.default_percent()))
                .collect(),
            skipped: BTreeSet::new(),
            update_delay: Duration::from_millis(1_500),
            window_open_delay: Duration::from_millis(1_000),
            menu_failures: 0,
            start_button_depth: 3,
            intercept_clicks: false,
        }
    }
}

impl AppOptions {
    /// Default site
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted credentials
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// The accepted credentials
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Show `percent` when `milestone` is reached
    #[must_use]
    pub fn with_percent(mut self, milestone: Milestone, percent: u8) -> Self {
        self.percents.insert(milestone, percent);
        self
    }

    /// Never update the display for `milestone`
    #[must_use]
    pub fn skipping(mut self, milestone: Milestone) -> Self {
        self.skipped.insert(milestone);
        self
    }

    /// Delay between a milestone and its display update
    #[must_use]
    pub const fn with_update_delay(mut self, delay: Duration) -> Self {
        self.update_delay = delay;
        self
    }

    /// Delay before the assignment window opens
    #[must_use]
    pub const fn with_window_open_delay(mut self, delay: Duration) -> Self {
        self.window_open_delay = delay;
        self
    }

    /// Ignore the first `failures` menu clicks
    #[must_use]
    pub const fn with_menu_failures(mut self, failures: u32) -> Self {
        self.menu_failures = failures;
        self
    }

    /// Nest the start button `depth` shadow roots deep
    #[must_use]
    pub const fn with_start_button_depth(mut self, depth: usize) -> Self {
        self.start_button_depth = depth;
        self
    }

    /// Fail every native click as intercepted
    #[must_use]
    pub const fn with_intercepted_clicks(mut self, intercept: bool) -> Self {
        self.intercept_clicks = intercept;
        self
    }
}

/// Clickable things the site reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    MoreOptions,
    SelectOrg,
    Submit,
    Menu,
    AnalyticsTab,
    WorkspaceTab,
    AssignmentLink,
    Start,
    Next,
    Radio(Milestone),
    TextAnswer,
    GroupTwo,
    CompleteInner,
    SubmitAnswers,
}

#[derive(Debug, Clone, Copy)]
struct LoginPage {
    page: NodeId,
    org_section: NodeId,
    org_input: NodeId,
    credential_section: NodeId,
    email: NodeId,
    password: NodeId,
    error: NodeId,
    menu: NodeId,
    nav_panel: NodeId,
    workspace_tab: NodeId,
    frame_router: NodeId,
}

#[derive(Debug, Clone, Copy)]
struct PlayerPage {
    label: NodeId,
    bar: NodeId,
    bar_text: NodeId,
    next: NodeId,
    lesson: NodeId,
    assessment: NodeId,
    final_fields: [NodeId; 2],
    viewer: NodeId,
    submit: NodeId,
    results: NodeId,
}

/// Behavior of the scripted site
#[derive(Debug)]
pub struct AssignmentApp {
    options: AppOptions,
    login: LoginPage,
    player: PlayerPage,
    targets: HashMap<NodeAddr, Target>,
    reached: Option<Milestone>,
    pending: Vec<(Duration, u8)>,
    window_due: Option<Duration>,
    menu_clicks: u32,
}

fn reattach(doc: &mut Document, id: NodeId) {
    doc.node_mut(id).detached = false;
}

fn appended_detached(doc: &mut Document, parent: NodeId, spec: NodeSpec) -> NodeId {
    let id = doc.append(parent, spec);
    doc.detach(id);
    id
}

fn build_login(world: &mut World, targets: &mut HashMap<NodeAddr, Target>) -> LoginPage {
    let mut doc = Document::new();
    let body = doc.body();
    let page = doc.append(body, NodeSpec::new("div").class("login-page").hidden());
    let more = doc.append(page, NodeSpec::new("a").text(MORE_LOGIN_OPTIONS));

    let org_section = doc.append(page, NodeSpec::new("div").class("org-login").hidden());
    let org_input = doc.append(
        org_section,
        NodeSpec::new("input").id(ORG_INPUT_ID).attr("type", "text"),
    );
    let select_org = doc.append(
        org_section,
        NodeSpec::new("button").class("select-org").text("Next"),
    );

    let credential_section = doc.append(page, NodeSpec::new("form").hidden());
    let email = doc.append(
        credential_section,
        NodeSpec::new("input").id(EMAIL_INPUT_ID).attr("type", "email"),
    );
    let password = doc.append(
        credential_section,
        NodeSpec::new("input").id(PASSWORD_INPUT_ID).attr("type", "password"),
    );
    let submit = doc.append(
        credential_section,
        NodeSpec::new("button").attr("type", "submit").text("Log In"),
    );
    let error = doc.append(page, NodeSpec::new("div").class("login-error").hidden());

    let menu = doc.append(
        body,
        NodeSpec::new("button").id(MENU_BUTTON_ID).text("Menu").hidden(),
    );
    let nav_panel = doc.append(body, NodeSpec::new("nav").hidden());
    let analytics_tab = doc.append(
        nav_panel,
        NodeSpec::new("span").id(ANALYTICS_TAB_ID).text("Analytics"),
    );
    let workspace_tab = doc.append(
        nav_panel,
        NodeSpec::new("span")
            .id(WORKSPACE_TAB_ID)
            .text("Analytics Workspace")
            .hidden(),
    );

    let frame_router = appended_detached(
        &mut doc,
        body,
        NodeSpec::new("frame-router").class("main-iframe visible"),
    );
    let iframe = doc.append(
        frame_router,
        NodeSpec::new("iframe").attr("title", "Analytics UI"),
    );
    let mut workspace = Document::new();
    let workspace_body = workspace.body();
    let link = workspace.append(
        workspace_body,
        NodeSpec::new("a").attr("href", "#").text(ASSIGNMENT_LINK_TEXT),
    );
    doc.attach_frame(iframe, workspace);

    let window = world.add_window(LOGIN_URL, doc);
    let at = |node| NodeAddr {
        window,
        frames: Vec::new(),
        node,
    };
    targets.insert(at(more), Target::MoreOptions);
    targets.insert(at(select_org), Target::SelectOrg);
    targets.insert(at(submit), Target::Submit);
    targets.insert(at(menu), Target::Menu);
    targets.insert(at(analytics_tab), Target::AnalyticsTab);
    targets.insert(at(workspace_tab), Target::WorkspaceTab);
    targets.insert(
        NodeAddr {
            window,
            frames: vec![iframe],
            node: link,
        },
        Target::AssignmentLink,
    );

    LoginPage {
        page,
        org_section,
        org_input,
        credential_section,
        email,
        password,
        error,
        menu,
        nav_panel,
        workspace_tab,
        frame_router,
    }
}

/// Radio field whose input lives in its shadow root
fn radio_field(doc: &mut Document, parent: NodeId, name: &str, label: &str) -> (NodeId, NodeId) {
    let field = doc.append(parent, NodeSpec::new("gux-form-field-radio"));
    doc.append(field, NodeSpec::new("label").text(label));
    let root = doc.attach_shadow(field);
    let input = doc.append(
        root,
        NodeSpec::new("input")
            .attr("type", "radio")
            .attr("name", name)
            .value(label),
    );
    (field, input)
}

struct Assessment {
    document: Document,
    radios: Vec<(NodeId, Milestone)>,
    textarea: NodeId,
    final_fields: [NodeId; 2],
}

fn build_assessment() -> Assessment {
    let mut doc = Document::new();
    let body = doc.body();
    let mut radios = Vec::new();

    let first = doc.append(body, NodeSpec::new("section").class("question"));
    doc.append(first, NodeSpec::new("p").text("How many continents are there?"));
    for answer in ["5", FIRST_ANSWER, "9"] {
        let (_, input) = radio_field(&mut doc, first, "q1", answer);
        if answer == FIRST_ANSWER {
            radios.push((input, Milestone::Answered));
        }
    }

    let field = doc.append(body, NodeSpec::new("gux-form-field-textarea"));
    doc.append(field, NodeSpec::new("gux-truncate").text(TEXT_QUESTION_LABEL));
    let textarea = doc.append(field, NodeSpec::new("textarea").attr("slot", "input"));

    let second = doc.append(body, NodeSpec::new("section").class("question"));
    for answer in [SECOND_ANSWER, "No"] {
        let (_, input) = radio_field(&mut doc, second, "q3", answer);
        if answer == SECOND_ANSWER {
            radios.push((input, Milestone::FinalAnswered));
        }
    }

    let last = doc.append(body, NodeSpec::new("section").class("question"));
    let mut final_fields = [NodeId(0); 2];
    for (slot, answer) in [FINAL_ANSWER, "West"].into_iter().enumerate() {
        let (field, input) = radio_field(&mut doc, last, "q4", answer);
        doc.detach(field);
        final_fields[slot] = field;
        if answer == FINAL_ANSWER {
            radios.push((input, Milestone::Completed));
        }
    }

    Assessment {
        document: doc,
        radios,
        textarea,
        final_fields,
    }
}

fn build_player(
    world: &mut World,
    targets: &mut HashMap<NodeAddr, Target>,
    depth: usize,
) -> PlayerPage {
    let mut doc = Document::new();
    doc.set_viewport(ScrollBox::new(Overflow::Auto, 1_080, 4_000));
    let body = doc.body();

    let bar = doc.append(
        body,
        NodeSpec::new(PROGRESS_BAR_TAG).attr(FILL_PERCENT_ATTR, "0"),
    );
    let bar_root = doc.attach_shadow(bar);
    let bar_text = doc.append(bar_root, NodeSpec::new("div").text("0% complete"));
    let label = doc.append(
        body,
        NodeSpec::new("span")
            .class("progress-label")
            .text("0% complete")
            .hidden(),
    );

    let mut host = doc.append(body, NodeSpec::new("div").class("course-shell"));
    let mut root = doc.attach_shadow(host);
    for _ in 1..depth.max(1) {
        host = doc.append(root, NodeSpec::new("div").class("course-layer"));
        root = doc.attach_shadow(host);
    }
    let start = doc.append(root, NodeSpec::new("gux-button").text(START_BUTTON_TEXT));
    let next = appended_detached(
        &mut doc,
        root,
        NodeSpec::new("gux-button").text(NEXT_BUTTON_TEXT),
    );

    let lesson = doc.append(
        body,
        NodeSpec::new("div")
            .class("lesson")
            .scroll(ScrollBox::new(Overflow::Auto, 400, 2_000)),
    );
    doc.append(lesson, NodeSpec::new("p").text("Lesson content"));

    let sidebar = doc.append(body, NodeSpec::new("aside"));
    doc.append(sidebar, NodeSpec::new("button").text("1. Group 1"));
    let group_two = doc.append(sidebar, NodeSpec::new("button").text(GROUP_TWO_TEXT));

    let assessment = appended_detached(
        &mut doc,
        body,
        NodeSpec::new("iframe").id(ASSESSMENT_FRAME_ID),
    );
    let built = build_assessment();
    doc.attach_frame(assessment, built.document);

    let viewer = appended_detached(&mut doc, body, NodeSpec::new(DOCUMENT_VIEWER_TAG));

    let (host_tag, host_class) = COMPLETE_BUTTON_HOST
        .split_once('.')
        .unwrap_or((COMPLETE_BUTTON_HOST, ""));
    let complete = doc.append(body, NodeSpec::new(host_tag).class(host_class));
    let complete_root = doc.attach_shadow(complete);
    let complete_inner = doc.append(
        complete_root,
        NodeSpec::new("button").text("Complete Assignment"),
    );
    let submit = appended_detached(&mut doc, body, NodeSpec::new("button").text(SUBMIT_TEXT));

    let results = appended_detached(&mut doc, body, NodeSpec::new("div").class("results"));
    doc.append(
        results,
        NodeSpec::new("h2").text(format!("{RESULTS_HEADING_TEXT}!")),
    );
    doc.append(results, NodeSpec::new("p").text("You scored 100%"));

    let window = world.add_closed_window(PLAYER_URL, doc);
    let at = |node| NodeAddr {
        window,
        frames: Vec::new(),
        node,
    };
    targets.insert(at(start), Target::Start);
    targets.insert(at(next), Target::Next);
    targets.insert(at(group_two), Target::GroupTwo);
    targets.insert(at(complete_inner), Target::CompleteInner);
    targets.insert(at(submit), Target::SubmitAnswers);
    let in_frame = |node| NodeAddr {
        window,
        frames: vec![assessment],
        node,
    };
    for (input, milestone) in built.radios {
        targets.insert(in_frame(input), Target::Radio(milestone));
    }
    targets.insert(in_frame(built.textarea), Target::TextAnswer);

    PlayerPage {
        label,
        bar,
        bar_text,
        next,
        lesson,
        assessment,
        final_fields: built.final_fields,
        viewer,
        submit,
        results,
    }
}

impl AssignmentApp {
    /// Build the site's windows and its behavior
    #[must_use]
    pub fn build(options: AppOptions) -> (World, Self) {
        let mut world = World::new();
        let mut targets = HashMap::new();
        let login = build_login(&mut world, &mut targets);
        let player = build_player(&mut world, &mut targets, options.start_button_depth);
        let app = Self {
            options,
            login,
            player,
            targets,
            reached: None,
            pending: Vec::new(),
            window_due: None,
            menu_clicks: 0,
        };
        (world, app)
    }

    /// Mock session over a fresh copy of the site
    #[must_use]
    pub fn session(options: AppOptions, clock: SharedClock) -> MockSession {
        let intercept = options.intercept_clicks;
        let (world, app) = Self::build(options);
        MockSession::new(world, app, clock).with_intercepted_clicks(intercept)
    }

    /// Index of the login window
    pub const LOGIN_WINDOW: usize = 0;
    /// Index of the assignment window
    pub const PLAYER_WINDOW: usize = 1;

    /// Percentage shown on the progress bar of `world`, if it is readable
    #[must_use]
    pub fn displayed_percent(world: &World) -> Option<u8> {
        let doc = world.window_document(Self::PLAYER_WINDOW)?;
        let bar = doc.by_tag(Document::ROOT, PROGRESS_BAR_TAG).into_iter().next()?;
        doc.node(bar).attr(FILL_PERCENT_ATTR)?.parse().ok()
    }

    fn reach(&mut self, milestone: Milestone, now: Duration) {
        if self.reached.is_some_and(|r| r >= milestone) {
            return;
        }
        self.reached = Some(milestone);
        debug!(?milestone, "milestone reached");
        if self.options.skipped.contains(&milestone) {
            debug!(?milestone, "display update skipped");
            return;
        }
        let percent = self
            .options
            .percents
            .get(&milestone)
            .copied()
            .unwrap_or_else(|| milestone.default_percent());
        self.pending.push((now + self.options.update_delay, percent));
    }

    fn flush(&mut self, world: &mut World, now: Duration) {
        if self.window_due.is_some_and(|due| due <= now) {
            self.window_due = None;
            world.open_window(Self::PLAYER_WINDOW);
            debug!("assignment window opened");
        }
        let (due, later): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|(at, _)| *at <= now);
        self.pending = later;
        let Some(doc) = world.window_document_mut(Self::PLAYER_WINDOW) else {
            return;
        };
        for (_, percent) in due {
            let text = format!("{percent}% complete");
            doc.set_text(self.player.label, text.clone());
            doc.set_text(self.player.bar_text, text);
            doc.node_mut(self.player.bar)
                .set_attr(FILL_PERCENT_ATTR, percent.to_string());
            trace!(percent, "progress display updated");
        }
    }

    fn login_doc<'w>(&self, world: &'w mut World) -> Option<&'w mut Document> {
        world.window_document_mut(Self::LOGIN_WINDOW)
    }

    fn player_doc<'w>(&self, world: &'w mut World) -> Option<&'w mut Document> {
        world.window_document_mut(Self::PLAYER_WINDOW)
    }

    fn assessment_doc<'w>(&self, world: &'w mut World) -> Option<&'w mut Document> {
        world.document_mut(Self::PLAYER_WINDOW, &[self.player.assessment])
    }

    fn on_login_click(&mut self, world: &mut World, target: Target) {
        let page = self.login;
        let credentials = self.options.credentials.clone();
        let menu_failures = self.options.menu_failures;
        let Some(doc) = self.login_doc(world) else {
            return;
        };
        match target {
            Target::MoreOptions => doc.set_hidden(page.org_section, false),
            Target::SelectOrg => {
                if doc.node(page.org_input).value == credentials.org {
                    doc.set_hidden(page.org_section, true);
                    doc.set_hidden(page.credential_section, false);
                } else {
                    doc.set_text(page.error, "Unknown organization");
                    doc.set_hidden(page.error, false);
                }
            }
            Target::Submit => {
                let accepted = doc.node(page.email).value == credentials.email
                    && doc.node(page.password).value == credentials.password;
                if accepted {
                    doc.set_hidden(page.page, true);
                    doc.set_hidden(page.menu, false);
                } else {
                    doc.set_text(page.error, "Invalid email or password");
                    doc.set_hidden(page.error, false);
                }
            }
            Target::Menu => {
                self.menu_clicks += 1;
                if self.menu_clicks > menu_failures {
                    doc.set_hidden(page.nav_panel, false);
                } else {
                    debug!(clicks = self.menu_clicks, "menu click ignored");
                }
            }
            Target::AnalyticsTab => doc.set_hidden(page.workspace_tab, false),
            Target::WorkspaceTab => reattach(doc, page.frame_router),
            _ => {}
        }
    }

    fn on_player_click(&mut self, world: &mut World, target: Target, now: Duration) {
        let player = self.player;
        let reached = self.reached;
        match target {
            Target::Start if reached.is_none() => {
                if let Some(doc) = self.player_doc(world) {
                    doc.set_hidden(player.label, false);
                    reattach(doc, player.next);
                }
                self.reach(Milestone::Started, now);
            }
            Target::Next if reached == Some(Milestone::Scrolled) => {
                self.reach(Milestone::Advanced, now);
            }
            Target::Next if reached >= Some(Milestone::Advanced) => {
                if let Some(doc) = self.player_doc(world) {
                    reattach(doc, player.assessment);
                }
            }
            Target::Radio(milestone) => self.on_answer(milestone, now),
            Target::GroupTwo if reached >= Some(Milestone::FinalAnswered) => {
                if let Some(doc) = self.player_doc(world) {
                    reattach(doc, player.viewer);
                }
                if let Some(doc) = self.assessment_doc(world) {
                    for field in player.final_fields {
                        reattach(doc, field);
                    }
                }
            }
            Target::CompleteInner if reached == Some(Milestone::Completed) => {
                if let Some(doc) = self.player_doc(world) {
                    reattach(doc, player.submit);
                }
            }
            Target::SubmitAnswers => {
                if let Some(doc) = self.player_doc(world) {
                    reattach(doc, player.results);
                }
            }
            _ => debug!(?target, ?reached, "click has no effect yet"),
        }
    }

    fn on_answer(&mut self, milestone: Milestone, now: Duration) {
        let expected_before = match milestone {
            Milestone::Answered => Milestone::Advanced,
            Milestone::FinalAnswered => Milestone::TextEntered,
            Milestone::Completed => Milestone::FinalAnswered,
            _ => return,
        };
        if self.reached == Some(expected_before) {
            self.reach(milestone, now);
        }
    }
}

impl MockBehavior for AssignmentApp {
    fn on_tick(&mut self, world: &mut World, now: Duration) {
        self.flush(world, now);
    }

    fn on_activate(&mut self, world: &mut World, target: &NodeAddr, now: Duration) {
        let Some(hit) = self.targets.get(target).copied() else {
            return;
        };
        trace!(target = ?hit, "activated");
        match hit {
            Target::AssignmentLink => {
                if self.window_due.is_none() {
                    self.window_due = Some(now + self.options.window_open_delay);
                }
            }
            Target::MoreOptions
            | Target::SelectOrg
            | Target::Submit
            | Target::Menu
            | Target::AnalyticsTab
            | Target::WorkspaceTab => self.on_login_click(world, hit),
            _ => self.on_player_click(world, hit, now),
        }
        self.flush(world, now);
    }

    fn on_event(&mut self, world: &mut World, target: &NodeAddr, event: &str, now: Duration) {
        if self.targets.get(target) != Some(&Target::TextAnswer) {
            return;
        }
        if !matches!(event, "change" | "blur") || self.reached != Some(Milestone::Answered) {
            return;
        }
        let filled = self
            .assessment_doc(world)
            .is_some_and(|doc| !doc.node(target.node).value.trim().is_empty());
        if filled {
            self.reach(Milestone::TextEntered, now);
        }
        self.flush(world, now);
    }

    fn on_scroll(&mut self, world: &mut World, window: usize, now: Duration) {
        if window != Self::PLAYER_WINDOW || self.reached != Some(Milestone::Started) {
            return;
        }
        let lesson = self.player.lesson;
        let at_bottom = world
            .window_document(window)
            .is_some_and(|doc| doc.node(lesson).scroll.at_bottom() && doc.viewport().at_bottom());
        if at_bottom {
            self.reach(Milestone::Scrolled, now);
        }
        self.flush(world, now);
    }

    fn on_navigate(&mut self, world: &mut World, window: usize, _url: &str, now: Duration) {
        if window == Self::LOGIN_WINDOW {
            let page = self.login.page;
            if let Some(doc) = self.login_doc(world) {
                doc.set_hidden(page, false);
            }
        }
        self.flush(world, now);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::locator::Locator;
    use crate::probe::Probe;
    use crate::session::Session;

    fn started_session() -> (std::sync::Arc<FakeClock>, MockSession) {
        let clock = FakeClock::shared();
        let mut session = AssignmentApp::session(AppOptions::new(), clock.clone());
        session.world_mut().open_window(AssignmentApp::PLAYER_WINDOW);
        let handles = session.window_handles().unwrap();
        session.switch_to_window(&handles[1]).unwrap();
        (clock, session)
    }

    mod login_tests {
        use super::*;

        #[test]
        fn test_login_page_hidden_until_navigation() {
            let mut session = AssignmentApp::session(AppOptions::new(), FakeClock::shared());
            let link = session
                .find_element(&Locator::link_text(MORE_LOGIN_OPTIONS))
                .unwrap();
            assert!(!session.element_state(&link).unwrap().displayed);

            session.navigate("https://login.test/").unwrap();
            assert!(session.element_state(&link).unwrap().displayed);
        }

        #[test]
        fn test_wrong_org_shows_error() {
            let mut session = AssignmentApp::session(AppOptions::new(), FakeClock::shared());
            session.navigate("https://login.test/").unwrap();
            let link = session
                .find_element(&Locator::link_text(MORE_LOGIN_OPTIONS))
                .unwrap();
            session.click(&link).unwrap();
            let org = session.find_element(&Locator::id("org")).unwrap();
            session.send_keys(&org, "globex").unwrap();
            let select = session.find_element(&Locator::new("button.select-org")).unwrap();
            session.click(&select).unwrap();

            let email = session.find_element(&Locator::id("email")).unwrap();
            assert!(!session.element_state(&email).unwrap().displayed);
            let error = session
                .find_element(&Locator::text_contains("Unknown organization"))
                .unwrap();
            assert!(session.element_state(&error).unwrap().displayed);
        }

        #[test]
        fn test_menu_failures_are_counted() {
            let options = AppOptions::new().with_menu_failures(1);
            let mut session = AssignmentApp::session(options, FakeClock::shared());
            let menu = session
                .world()
                .window_document(0)
                .unwrap()
                .element_by_id(MENU_BUTTON_ID)
                .unwrap();
            session
                .world_mut()
                .window_document_mut(0)
                .unwrap()
                .set_hidden(menu, false);

            let button = session.find_element(&Locator::id(MENU_BUTTON_ID)).unwrap();
            let analytics = session.find_element(&Locator::id(ANALYTICS_TAB_ID)).unwrap();
            session.click(&button).unwrap();
            assert!(!session.element_state(&analytics).unwrap().displayed);
            session.click(&button).unwrap();
            assert!(session.element_state(&analytics).unwrap().displayed);
        }
    }

    mod player_tests {
        use super::*;

        #[test]
        fn test_start_updates_display_after_delay() {
            let (clock, mut session) = started_session();
            let clicked = session
                .evaluate(&Probe::ShadowClickControl {
                    text: START_BUTTON_TEXT.into(),
                })
                .unwrap();
            assert_eq!(clicked, serde_json::json!(true));

            let label = Locator::text_contains("% complete");
            let found = session.find_element(&label).unwrap();
            assert!(session.element_state(&found).unwrap().displayed);
            assert_eq!(AssignmentApp::displayed_percent(session.world()), Some(0));

            let scroll = session.evaluate(&Probe::ScrollAllToBottom).unwrap();
            assert_eq!(scroll["regions"], 1);
            assert_eq!(scroll["moved"], 2);
            assert_eq!(AssignmentApp::displayed_percent(session.world()), Some(0));

            clock.advance(Duration::from_millis(1_500));
            session.current_url().unwrap();
            assert_eq!(AssignmentApp::displayed_percent(session.world()), Some(33));
        }

        #[test]
        fn test_next_before_scrolling_does_nothing() {
            let (clock, mut session) = started_session();
            for text in [START_BUTTON_TEXT, NEXT_BUTTON_TEXT] {
                session
                    .evaluate(&Probe::ShadowClickControl { text: text.into() })
                    .unwrap();
            }
            clock.advance(Duration::from_secs(5));
            session.current_url().unwrap();
            assert_eq!(AssignmentApp::displayed_percent(session.world()), Some(0));
            assert!(session
                .find_elements(&Locator::id(ASSESSMENT_FRAME_ID))
                .unwrap()
                .is_empty());
        }

        #[test]
        fn test_skipped_milestone_keeps_display() {
            let clock = FakeClock::shared();
            let options = AppOptions::new().skipping(Milestone::Scrolled);
            let mut session = AssignmentApp::session(options, clock.clone());
            session.world_mut().open_window(AssignmentApp::PLAYER_WINDOW);
            let handles = session.window_handles().unwrap();
            session.switch_to_window(&handles[1]).unwrap();

            session
                .evaluate(&Probe::ShadowClickControl {
                    text: START_BUTTON_TEXT.into(),
                })
                .unwrap();
            session.evaluate(&Probe::ScrollAllToBottom).unwrap();
            clock.advance(Duration::from_secs(10));
            session.current_url().unwrap();
            assert_eq!(AssignmentApp::displayed_percent(session.world()), Some(0));
        }

        #[test]
        fn test_start_button_depth() {
            let (world, _) =
                AssignmentApp::build(AppOptions::new().with_start_button_depth(5));
            let doc = world.window_document(AssignmentApp::PLAYER_WINDOW).unwrap();
            let shell = doc.query(Document::ROOT, "div.course-shell").unwrap().unwrap();
            let mut depth = 0;
            let mut host = Some(shell);
            while let Some(current) = host {
                let Some(root) = doc.node(current).shadow_root else {
                    break;
                };
                depth += 1;
                host = doc.query(root, "div.course-layer").unwrap();
            }
            assert_eq!(depth, 5);
        }
    }

    #[test]
    fn test_default_percents_follow_milestone_order() {
        let percents: Vec<u8> = Milestone::ALL.iter().map(Milestone::default_percent).collect();
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(percents.last(), Some(&100));
    }
}
