mod models;
mod overlay;
mod validator;

pub use models::{
    FeeRecipientRequest, FeeSplitPlan, PartnerOverlay, RecipientIdentity, ResolvedRecipient,
    SocialProvider,
};
pub use overlay::attach_partner_overlay;
pub use validator::{validate_split, validate_split_full};
