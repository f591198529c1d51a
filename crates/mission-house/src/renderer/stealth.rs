//! Anti-fingerprinting countermeasures.
//!
//! The init script is registered with `Page.addScriptToEvaluateOnNewDocument`
//! before the first navigation, so it runs ahead of any site script on every
//! document the session loads.

/// Chromium flags applied at launch.
pub const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-infobars",
    "--no-first-run",
    "--no-default-browser-check",
    "--lang=en-AU",
];

/// Languages reported by the patched navigator.
pub const ACCEPT_LANGUAGE: &str = "en-AU,en;q=0.9";

/// Init script patching the usual automation tells.
pub const STEALTH_SCRIPT: &str = r#"
(() => {
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-AU', 'en'], configurable: true });
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5], configurable: true });
    Object.defineProperty(navigator, 'hardwareConcurrency', { get: () => 8, configurable: true });
    Object.defineProperty(navigator, 'deviceMemory', { get: () => 8, configurable: true });

    if (!window.chrome) { window.chrome = {}; }
    if (!window.chrome.runtime) {
        window.chrome.runtime = {
            connect: function() { return { onDisconnect: { addListener: function() {} }, postMessage: function() {} }; },
            sendMessage: function() {},
        };
    }

    const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
    if (originalQuery) {
        window.navigator.permissions.query = (parameters) => (
            parameters.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : originalQuery(parameters)
        );
    }

    const patchGl = (proto) => {
        if (!proto) return;
        const getParameter = proto.getParameter;
        proto.getParameter = function(parameter) {
            if (parameter === 37445) return 'Intel Inc.';
            if (parameter === 37446) return 'Intel Iris OpenGL Engine';
            return getParameter.apply(this, arguments);
        };
    };
    patchGl(window.WebGLRenderingContext && WebGLRenderingContext.prototype);
    patchGl(window.WebGL2RenderingContext && WebGL2RenderingContext.prototype);

    for (const key of ['__playwright', '__puppeteer', '__selenium', '__webdriver_script_fn', 'callPhantom', '_phantom']) {
        try { delete window[key]; } catch (_) {}
    }
    for (const key of ['__webdriver_evaluate', '__driver_evaluate', '__selenium_unwrapped', '__fxdriver_evaluate']) {
        try { delete document[key]; } catch (_) {}
    }
})();
"#;
