//! Script-facing choreographer
//!
//! `Choreographer` and `FrameCallbackListener` host objects. Frame callbacks
//! supplied by script run on the scripting dispatcher, never on the thread
//! that delivered the vsync tick.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Choreographer, FrameCallbackToken, FrameInfo};
use crate::binding::{Bindable, BindingBuilder, HostRef, Hybrid};
use crate::convert::{mismatch, Convertible};
use crate::core::BindingResult;
use crate::dispatch::Dispatcher;
use crate::value::{ScriptFunction, Value};

impl Convertible for FrameInfo {
    fn type_name() -> String {
        "FrameInfo".to_string()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => return Err(mismatch::<Self>(&other)),
        };
        let mut field = |key: &str| fields.remove(key).unwrap_or_default();
        Ok(Self {
            timestamp: u64::from_value(field("timestamp"))?,
            frame_duration: Option::<u64>::from_value(field("frameDuration"))?,
            start_time: u64::from_value(field("startTime"))?,
            time_since_last_frame: f64::from_value(field("timeSinceLastFrame"))?,
            passed_seconds: f64::from_value(field("passedSeconds"))?,
        })
    }

    fn into_value(self) -> Value {
        let mut fields = HashMap::with_capacity(5);
        fields.insert("timestamp".to_string(), self.timestamp.into_value());
        fields.insert("frameDuration".to_string(), self.frame_duration.into_value());
        fields.insert("startTime".to_string(), self.start_time.into_value());
        fields.insert("timeSinceLastFrame".to_string(), self.time_since_last_frame.into_value());
        fields.insert("passedSeconds".to_string(), self.passed_seconds.into_value());
        Value::Object(fields)
    }
}

/// Script handle on a [`Choreographer`].
pub struct ChoreographerObject {
    choreographer: Choreographer,
    script: Arc<dyn Dispatcher>,
}

impl ChoreographerObject {
    /// `script` is the dispatcher script callbacks are hopped to.
    pub fn new(choreographer: Choreographer, script: Arc<dyn Dispatcher>) -> BindingResult<HostRef<Self>> {
        Hybrid::new(Self {
            choreographer,
            script,
        })
    }

    pub fn choreographer(&self) -> &Choreographer {
        &self.choreographer
    }

    fn add_listener(&self, callback: ScriptFunction) -> BindingResult<HostRef<FrameCallbackListener>> {
        let script = Arc::clone(&self.script);
        let token = self.choreographer.add_frame_callback(Arc::new(move |info: &FrameInfo| {
            if let Err(err) = callback.schedule(&*script, vec![(*info).into_value()]) {
                tracing::warn!(target: "frame", function = %callback.name(), "frame callback not delivered: {err}");
            }
        }))?;
        FrameCallbackListener::new(self.choreographer.clone(), token)
    }
}

impl Bindable for ChoreographerObject {
    const TYPE_NAME: &'static str = "Choreographer";

    fn load_bindings(builder: &mut BindingBuilder<Self>) -> BindingResult<()> {
        builder
            .method("start", |this: &Self| this.choreographer.start())?
            .method("stop", |this: &Self| this.choreographer.stop())?
            .method("release", |this: &Self| this.choreographer.dispose())?
            .method("addFrameCallbackListener", |this: &Self, callback: ScriptFunction| {
                this.add_listener(callback)
            })?
            .getter("isRunning", |this: &Self| this.choreographer.is_running())?;
        Ok(())
    }
}

/// Handle returned by `addFrameCallbackListener`.
pub struct FrameCallbackListener {
    choreographer: Choreographer,
    token: FrameCallbackToken,
}

impl FrameCallbackListener {
    fn new(choreographer: Choreographer, token: FrameCallbackToken) -> BindingResult<HostRef<Self>> {
        Hybrid::new(Self { choreographer, token })
    }

    pub fn token(&self) -> FrameCallbackToken {
        self.token
    }
}

impl Bindable for FrameCallbackListener {
    const TYPE_NAME: &'static str = "FrameCallbackListener";

    fn load_bindings(builder: &mut BindingBuilder<Self>) -> BindingResult<()> {
        builder
            .method("remove", |this: &Self| {
                this.choreographer.remove_frame_callback(this.token);
            })?
            .getter("isValid", |this: &Self| this.choreographer.contains_frame_callback(this.token))?;
        Ok(())
    }
}
