//! Change-feed subscription lifecycle.

/// Status of one feed subscription instance.
///
/// `Connecting` resolves to exactly one of the other states. The degraded
/// states are terminal for the instance: the feed is not retried, the list
/// keeps working on local state only, and the viewer sees a persistent
/// warning. A fresh subscription (new tab, reload) starts over at
/// `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Connecting,
    Subscribed,
    ChannelError,
    TimedOut,
}

impl FeedStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::ChannelError => "channel_error",
            Self::TimedOut => "timed_out",
        }
    }

    /// True for the terminal failure states.
    #[must_use]
    pub fn is_degraded(self) -> bool {
        matches!(self, Self::ChannelError | Self::TimedOut)
    }

    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_states_are_exactly_channel_error_and_timed_out() {
        assert!(!FeedStatus::Connecting.is_degraded());
        assert!(!FeedStatus::Subscribed.is_degraded());
        assert!(FeedStatus::ChannelError.is_degraded());
        assert!(FeedStatus::TimedOut.is_degraded());
    }

    #[test]
    fn as_str_is_stable() {
        assert_eq!(FeedStatus::Connecting.as_str(), "connecting");
        assert_eq!(FeedStatus::Subscribed.as_str(), "subscribed");
        assert_eq!(FeedStatus::ChannelError.as_str(), "channel_error");
        assert_eq!(FeedStatus::TimedOut.as_str(), "timed_out");
    }
}
