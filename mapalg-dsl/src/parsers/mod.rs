mod while_loop;
