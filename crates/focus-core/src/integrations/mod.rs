pub mod audio;
pub mod command;
pub mod notify;
pub mod traits;

pub use audio::{list_sounds, resolve_sound, AudioPlayer};
pub use command::ShellCommandRunner;
pub use notify::DesktopNotifier;
pub use traits::{CommandRunner, Noop, Notifier, Renderer, SoundPlayer};
