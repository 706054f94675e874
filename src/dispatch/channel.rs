use tokio::sync::oneshot;

use super::wire::{MethodCall, Response};

pub(super) enum Command {
    Call {
        call: MethodCall,
        respond_to: oneshot::Sender<Response>,
    },
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}
