use comrak::options::Options;

/// GFM options used for every conversion: tables, strikethrough, autolinks,
/// task lists, and soft line breaks rendered as `<br />`.
pub(crate) fn default_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.tagfilter = false;

    let render = &mut options.render;
    render.hardbreaks = true;
    render.github_pre_lang = false;
    render.r#unsafe = true;
    render.sourcepos = false;

    options
}
