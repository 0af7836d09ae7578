//! Control page renderer.

use std::fmt::Write as _;

use crate::device::{Device, DriveStrength, MorseStatus};

const DEFAULT_BANNER: &str = "Clock generator ready";

/// Escape text for use in HTML content and double-quoted attributes.
pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = "<style>\
body{font-family:sans-serif;background:#f5f7fa;margin:0;}\
.page{display:flex;justify-content:center;padding:2em;}\
.card{background:#fff;border-radius:12px;box-shadow:0 8px 24px rgba(15,23,42,0.15);padding:2em;max-width:460px;width:100%;}\
.card h1{text-align:center;margin:0;color:#1f2937;}\
.card form{display:flex;flex-direction:column;gap:1.1em;margin-top:1.2em;}\
.card label{display:flex;flex-direction:column;font-weight:600;color:#374151;gap:0.45em;}\
.card input,.card select{font-size:1em;padding:0.55em 0.7em;border:1px solid #d1d5db;border-radius:8px;}\
.status{margin-top:1em;padding:0.7em 1em;border-radius:8px;font-weight:600;}\
.status.ok{background:#ecfdf5;color:#065f46;}\
.status.error{background:#fef2f2;color:#991b1b;}\
.readout{font-size:2em;font-family:monospace;}\
.adjust-row{display:flex;gap:0.6em;align-items:center;flex-wrap:wrap;}\
.step-group{display:flex;flex-wrap:wrap;gap:0.4em;}\
.output-toggle{padding:0.55em 0.9em;border:none;border-radius:8px;font-weight:600;cursor:pointer;}\
.output-toggle.on{background:#10b981;color:#064e3b;}\
.output-toggle.off{background:#f87171;color:#7f1d1d;}\
.output-toggle:disabled{opacity:0.6;cursor:not-allowed;}\
.morse-details{margin-top:1.8em;border:1px solid #e5e7eb;border-radius:12px;padding:1.1em 1.2em;}\
.morse-status.playing{color:#2563eb;}\
.morse-status.stopped{color:#b91c1c;}\
.morse-play,.morse-stop{padding:0.6em 1.1em;border:none;border-radius:8px;font-weight:600;cursor:pointer;}\
.morse-play{background:#2563eb;color:#f9fafb;}\
.morse-stop{background:#ef4444;color:#fff;}\
.footer{margin-top:1.5em;font-size:0.85em;color:#6b7280;display:flex;flex-direction:column;gap:0.3em;}\
</style>";

const SCRIPT: &str = "<script>\
document.addEventListener('DOMContentLoaded',function(){\
const form=document.getElementById('signal-form');\
const spinner=document.getElementById('frequency-spinner');\
let timer=null;\
window.scheduleSubmit=function(){if(timer)clearTimeout(timer);timer=setTimeout(function(){form.submit();},600);};\
document.querySelectorAll('input[name=step]').forEach(function(r){r.addEventListener('change',function(){spinner.step=r.value;});});\
spinner.addEventListener('change',scheduleSubmit);\
const status=document.getElementById('morse-status');\
const text=document.getElementById('morse-status-text');\
const play=document.getElementById('morse-play');\
const stop=document.getElementById('morse-stop');\
const toggle=document.getElementById('output-toggle');\
const apply=function(d){\
text.textContent=d.status;\
status.className='morse-status '+(d.playing?'playing':(d.status==='Stopped'?'stopped':'idle'));\
play.disabled=d.playing;stop.disabled=!d.playing;toggle.disabled=d.hold;\
};\
const poll=function(){fetch('/morse/status',{cache:'no-store'}).then(function(r){if(!r.ok)throw new Error('status');return r.json();}).then(apply).catch(function(){});};\
setInterval(poll,1000);\
});\
</script>";

/// Render the full control page for the current device state.
pub fn render_page(device: &Device) -> Vec<u8> {
    let signal = device.signal_state();
    let morse = device.morse();
    let defaults = morse.defaults();
    let banner = device.banner();
    let playing = morse.is_playing();
    let hold = device.hold_active();

    let (banner_class, banner_text) = if banner.is_empty() {
        ("status ok", DEFAULT_BANNER.to_string())
    } else if banner.is_error {
        ("status error", html_escape(&banner.message))
    } else {
        ("status ok", html_escape(&banner.message))
    };

    let status_class = match morse.status() {
        MorseStatus::Playing => "playing",
        MorseStatus::Stopped => "stopped",
        MorseStatus::Idle => "idle",
    };
    let morse_text = if defaults.text.is_empty() { "Hi!" } else { defaults.text.as_str() };
    let wpm = if (1..=1000).contains(&defaults.wpm) { defaults.wpm } else { 15 };
    let fwpm = defaults
        .farnsworth_wpm
        .map(|fw| fw.to_string())
        .unwrap_or_default();

    let mut page = String::with_capacity(8 * 1024);
    page.push_str("<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">");
    page.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">");
    page.push_str("<title>Clock Generator</title>");
    page.push_str(STYLE);
    page.push_str(SCRIPT);
    page.push_str("</head><body><div class=\"page\"><div class=\"card\"><h1>Clock Generator</h1>");

    let _ = write!(page, "<div class=\"{}\"><span>{}</span></div>", banner_class, banner_text);

    page.push_str("<form id=\"signal-form\" method=\"POST\" action=\"/signal\">");
    let _ = write!(
        page,
        "<label>Frequency (Hz)<div id=\"frequency-display\" class=\"readout\" role=\"status\">{}</div></label>",
        signal.frequency_hz
    );
    let _ = write!(
        page,
        "<label>Adjust<div class=\"adjust-row\">\
<input type=\"number\" name=\"frequency\" id=\"frequency-spinner\" min=\"8000\" max=\"200000000\" step=\"1000\" value=\"{}\">\
<button type=\"submit\" name=\"action\" value=\"toggle-output\" id=\"output-toggle\" class=\"output-toggle {}\" aria-pressed=\"{}\"{}>{}</button>\
</div></label>",
        signal.frequency_hz,
        if signal.output_enabled { "on" } else { "off" },
        signal.output_enabled,
        if hold { " disabled" } else { "" },
        if signal.output_enabled { "Output ON" } else { "Output OFF" },
    );

    page.push_str("<label>Increment<div class=\"step-group\">");
    for (value, label) in [
        (1u64, "1 Hz"),
        (10, "10 Hz"),
        (100, "100 Hz"),
        (1_000, "1 kHz"),
        (10_000, "10 kHz"),
        (100_000, "100 kHz"),
        (1_000_000, "1 MHz"),
        (10_000_000, "10 MHz"),
    ] {
        let _ = write!(
            page,
            "<label class=\"step-option\"><input type=\"radio\" name=\"step\" value=\"{}\"{}>{}</label>",
            value,
            if value == 1_000 { " checked" } else { "" },
            label
        );
    }
    page.push_str("</div></label>");

    page.push_str("<label>Drive strength<select name=\"drive\" onchange=\"scheduleSubmit()\">");
    for drive in DriveStrength::ALL {
        let _ = write!(
            page,
            "<option value=\"{}\"{}>{}</option>",
            drive.milliamps(),
            if drive == signal.drive { " selected" } else { "" },
            drive
        );
    }
    page.push_str("</select></label></form>");

    let _ = write!(
        page,
        "<details class=\"morse-details\"{} id=\"morse-details\"><summary>Morse Playback</summary>",
        if playing || hold { " open" } else { "" }
    );
    let _ = write!(
        page,
        "<div id=\"morse-status\" class=\"morse-status {}\" data-playing=\"{}\" data-hold=\"{}\">Status: <span id=\"morse-status-text\">{}</span></div>",
        status_class,
        playing,
        hold,
        html_escape(morse.status().text())
    );
    let _ = write!(
        page,
        "<form class=\"morse-form\" method=\"POST\" action=\"/morse\">\
<label>Text<input type=\"text\" name=\"text\" maxlength=\"20\" value=\"{}\" required></label>\
<label>WPM<input type=\"number\" name=\"wpm\" min=\"1\" max=\"1000\" value=\"{}\" required></label>\
<label>Farnsworth WPM<input type=\"number\" name=\"fwpm\" min=\"1\" max=\"1000\" value=\"{}\" placeholder=\"optional\"></label>\
<button type=\"submit\" class=\"morse-play\" id=\"morse-play\"{}>Play</button></form>",
        html_escape(morse_text),
        wpm,
        fwpm,
        if playing { " disabled" } else { "" }
    );
    let _ = write!(
        page,
        "<form method=\"POST\" action=\"/morse/stop\" class=\"morse-stop-form\">\
<button type=\"submit\" class=\"morse-stop\" id=\"morse-stop\"{}>Stop</button></form></details>",
        if playing { "" } else { " disabled" }
    );

    let _ = write!(
        page,
        "<div class=\"footer\"><span>Frequency is applied to CLK0; drive strength maps to the chip's discrete 2/4/6/8 mA settings.</span>\
<span>{} v{}</span></div>",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    page.push_str("</div></div></body></html>");

    page.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{SignalController, SignalState, SimulatedChip};

    fn device() -> Device {
        Device::new(SignalController::new(Box::new(SimulatedChip::default()), SignalState::default()))
    }

    fn render(device: &Device) -> String {
        String::from_utf8(render_page(device)).unwrap()
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(html_escape("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }

    #[test]
    fn default_page_shows_ready_banner_and_settings() {
        let page = render(&device());
        assert!(page.contains("<div class=\"status ok\"><span>Clock generator ready</span></div>"));
        assert!(page.contains("value=\"1008000\""));
        assert!(page.contains("<option value=\"4\" selected>4 mA</option>"));
        assert!(page.contains("Output OFF"));
        assert!(page.contains("value=\"PARIS\""));
        assert!(page.contains("id=\"morse-stop\" disabled"));
    }

    #[test]
    fn error_banner_is_escaped() {
        let mut dev = device();
        dev.set_status("Invalid characters: <~>", true);
        let page = render(&dev);
        assert!(page.contains("<div class=\"status error\"><span>Invalid characters: &lt;~&gt;</span></div>"));
    }

    #[test]
    fn hold_disables_output_toggle() {
        let mut dev = device();
        dev.apply_morse_hold(true);
        let page = render(&dev);
        assert!(page.contains("aria-pressed=\"false\" disabled>Output OFF"));
        assert!(page.contains("<details class=\"morse-details\" open"));
    }
}
