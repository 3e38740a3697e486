//! Injected JavaScript.
//!
//! Whole-document scripts are IIFE expressions for `run_script`; the
//! `*_FN` declarations are element-scoped functions invoked with `this`
//! bound to a resolved element.

/// True when any overlay is currently displayed.
pub const OVERLAY_OPEN_PROBE: &str = r#"
(function() {
    var modal = document.querySelector('.modal.show, .modal.in, .modal[style*="display: block"]');
    return modal !== null;
})();
"#;

/// Force-clear overlay state: drop backdrops, hide every modal, undo the
/// body scroll lock. The most reliable close path when the UI wedges.
pub const FORCE_CLEAR_OVERLAYS: &str = r#"
(function() {
    document.querySelectorAll('.modal-backdrop').forEach(function(backdrop) {
        backdrop.remove();
    });
    document.querySelectorAll('.modal').forEach(function(modal) {
        modal.style.display = 'none';
        modal.classList.remove('show', 'in');
        modal.setAttribute('aria-hidden', 'true');
    });
    document.body.classList.remove('modal-open');
    document.body.style.paddingRight = '';
    document.body.style.overflow = '';
    return true;
})();
"#;

/// Tag every CSS match under `this` with a retrievable key so the matches
/// can be re-found individually. Returns the match count.
pub const TAG_CSS_MATCHES_FN: &str = r#"
function(selector, token) {
    var nodes = this.querySelectorAll(selector);
    for (var i = 0; i < nodes.length; i++) {
        nodes[i].setAttribute('data-fct-key', token + '-' + i);
    }
    return nodes.length;
}
"#;

/// Same as [`TAG_CSS_MATCHES_FN`] for a relative XPath rooted at `this`.
pub const TAG_XPATH_MATCHES_FN: &str = r#"
function(path, token) {
    var result = document.evaluate(path, this, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
    var tagged = 0;
    for (var i = 0; i < result.snapshotLength; i++) {
        var node = result.snapshotItem(i);
        if (node.setAttribute) {
            node.setAttribute('data-fct-key', token + '-' + tagged);
            tagged++;
        }
    }
    return tagged;
}
"#;

pub const CLICK_FN: &str = "function() { this.click(); return true; }";

pub const VISIBLE_FN: &str = r#"
function() {
    var rect = this.getBoundingClientRect();
    var style = window.getComputedStyle(this);
    return rect.width > 0 && rect.height > 0
        && style.display !== 'none' && style.visibility !== 'hidden';
}
"#;

pub const ENABLED_FN: &str = r#"
function() {
    return !this.disabled && this.getAttribute('aria-disabled') !== 'true';
}
"#;

pub const ATTR_FN: &str = "function(name) { return this.getAttribute(name); }";

pub const SCROLL_CENTER_FN: &str =
    "function() { this.scrollIntoView({behavior: 'smooth', block: 'center'}); return true; }";

/// CSS selector used by the key-tagging round trip.
pub fn keyed_selector(token: &str, index: usize) -> String {
    format!("[data-fct-key='{token}-{index}']")
}
