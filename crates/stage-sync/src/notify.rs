use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// Non-blocking user notices (toasts, status bars).
pub trait Notifier {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Routes notices to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Success => log::info!("{message}"),
            NoticeLevel::Warning => log::warn!("{message}"),
            NoticeLevel::Error => log::error!("{message}"),
        }
    }
}

impl<N: Notifier + ?Sized> Notifier for Rc<N> {
    fn notify(&self, level: NoticeLevel, message: &str) {
        (**self).notify(level, message);
    }
}
