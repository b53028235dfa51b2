use crate::externals::display::sink::DisplaySink;

/// Pages that convert and redraw temperatures themselves once this flag is set.
pub const TRIGGER_FIELDS: [&str; 2] = ["Summary.vaTempConv.val", "Climate.vaTempConv.val"];

const ENABLED: i32 = 1;

/// Tells the display to recompute derived temperature values. Setting the
/// same flag again is harmless, so it fires after every temperature update.
#[derive(Clone)]
pub struct CrossFieldTrigger {
    sink: DisplaySink,
}

impl CrossFieldTrigger {
    pub fn new(sink: DisplaySink) -> Self {
        Self { sink }
    }

    pub async fn trigger(&self) {
        for field in TRIGGER_FIELDS {
            self.sink.set_field(field, ENABLED).await;
        }
    }
}
