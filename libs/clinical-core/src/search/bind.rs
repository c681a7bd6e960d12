use super::BindValue;

/// Push a bind value and return its 1-based placeholder index.
pub(super) fn push_bind(bind_params: &mut Vec<BindValue>, value: BindValue) -> usize {
    bind_params.push(value);
    bind_params.len()
}

pub(super) fn push_text(bind_params: &mut Vec<BindValue>, value: String) -> usize {
    push_bind(bind_params, BindValue::Text(value))
}
