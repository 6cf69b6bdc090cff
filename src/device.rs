const MOBILE_USER_AGENT_TOKENS: [&str; 8] = [
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

/// What the page reports about the device at startup.
#[derive(Clone, Debug, Default)]
pub(crate) struct DeviceHints {
    pub user_agent: String,
    pub has_touch: bool,
    pub narrow_viewport: bool,
}

impl DeviceHints {
    /// Hover previews make no sense without a pointer that can hover, so any
    /// one of the hints is enough to keep the widget off.
    pub(crate) fn is_touch_context(&self) -> bool {
        is_mobile_user_agent(&self.user_agent) || self.has_touch || self.narrow_viewport
    }
}

fn is_mobile_user_agent(user_agent: &str) -> bool {
    let user_agent = user_agent.to_ascii_lowercase();
    MOBILE_USER_AGENT_TOKENS
        .iter()
        .any(|token| user_agent.contains(token))
}

pub(crate) fn narrow_viewport_query(max_width: u32) -> String {
    format!("(max-width: {max_width}px)")
}
