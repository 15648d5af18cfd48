// Components module - building blocks of the chat screen
//
// - Title bar: app name, selected client, active-policy badge
// - Sidebar: clients, search, conversations
// - Thread: message bubbles and typing indicator
// - Composer panel: the draft
// - Status bar: reply phase, shortcuts, newest warning
// - Toast: surfaced errors

pub mod composer_panel;
pub mod sidebar;
pub mod status_bar;
pub mod thread;
pub mod title_bar;
pub mod toast;

pub use toast::Toast;
