// Model exports
pub mod chat;
pub mod domain;
pub mod requests;
pub mod responses;
pub mod ui_config;

pub use chat::{
    Attachment, Match, MatchListFilter, MatchScope, MatchSort, MatchStats, MatchStatus, MatchSummary, Message, MessageStatus,
    MessageType, Participant, Reaction, ReadReceipt, ReplyPreview, UserMatchActions,
};
pub use domain::{
    BoundingBox, CandidateQuery, DiscoveryPreferences, DiscoveryWeights, FeedPost,
    NotificationSettings, PetProfile, PremiumStatus, ScoredPet, SwipeAction, UserAccount,
};
pub use requests::{
    FeedPostRequest, ListMatchesQuery, MessagesQuery, RecommendationsQuery, SendMessageRequest,
    SwipeRequest, UiConfigQuery,
};
pub use responses::{
    ErrorResponse, HealthResponse, MatchFlagResponse, MatchesResponse, MessagesResponse,
    Pagination, RecommendationsResponse, SwipeResponse,
};
pub use ui_config::{Audience, UiConfig, UiConfigStatus};
