/// Map an entrypoint to the relative path of its module file.
///
/// `docs.flows.main:dataset_etl_flow` becomes `docs/flows/main.py` for the
/// extension `py`. Entrypoints already written as a path
/// (`flows/main.py:dataset_etl_flow`) keep that path. The symbol after `:` is
/// optional. Returns `None` when the module part is empty or has empty
/// segments.
pub fn module_path(entrypoint: &str, extension: &str) -> Option<String> {
  let module = match entrypoint.split_once(':') {
    Some((module, _symbol)) => module,
    None => entrypoint,
  }
  .trim();

  let suffix = format!(".{extension}");
  if module.contains('/') || module.ends_with(&suffix) {
    let path = module.trim_start_matches("./");
    let valid = !path.is_empty()
      && !path.starts_with('/')
      && path.split('/').all(|s| !s.is_empty() && s != "." && s != "..");
    return valid.then(|| path.to_string());
  }

  let segments: Vec<&str> = module.split('.').collect();
  if segments.iter().any(|s| s.is_empty()) {
    return None;
  }
  Some(format!("{}{suffix}", segments.join("/")))
}
