///
/// Callback Marshaling
///
/// `Callback` is a move-only, single-shot capture of a script function.
/// `Completion` pairs it with the event pump of the thread that captured it;
/// completing moves the callback into a job on that pump, so the only
/// remaining reference is released right after the one invocation.
///

use crate::exception::ScriptError;
use crate::pump::EventPump;
use crate::value::{ScriptFunction, ScriptValue};

#[derive(Debug)]
pub struct Callback {
    function: ScriptFunction,
}

impl Callback {
    pub fn new(function: ScriptFunction) -> Self {
        Self { function }
    }

    pub fn invoke(self, args: &[ScriptValue]) -> Result<(), ScriptError> {
        self.function.call(args).map(|_| ())
    }
}

#[derive(Debug)]
pub struct Completion {
    callback: Callback,
    origin: EventPump,
}

impl Completion {
    /// Capture `function` together with the calling thread's pump.
    pub fn capture(function: ScriptFunction) -> Self {
        Self::with_origin(function, EventPump::current())
    }

    pub fn with_origin(function: ScriptFunction, origin: EventPump) -> Self {
        Self {
            callback: Callback::new(function),
            origin,
        }
    }

    pub fn origin(&self) -> &EventPump {
        &self.origin
    }

    /// Post the invocation back to the origin pump. Safe to call from any thread.
    pub fn complete(self, args: Vec<ScriptValue>) {
        let Completion { callback, origin } = self;
        origin.post(move || callback.invoke(&args));
    }
}
